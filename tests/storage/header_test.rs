use std::fs::File;

use pxread::{
    storage::{charset::Charset, header::DataFileHeader},
    types::error::{DatabaseError, ErrorKind, Warning},
    utils::mock::{TableFileBuilder, TempDirectory, encode_alpha, encode_long, record},
};

fn parse(builder: TableFileBuilder, name: &str) -> Result<DataFileHeader, DatabaseError> {
    let dir = TempDirectory::new()?;
    let path = builder.write_to(&dir)?;
    let mut file = File::open(path)?;
    DataFileHeader::read_table(&mut file, name, None)
}

fn customer() -> TableFileBuilder {
    TableFileBuilder::new("customer.db")
        .field("Id", 0x04, 4)
        .field("Name", 0x01, 20)
        .field("Notes", 0x0C, 30)
        .sort_order("ascii")
        .auto_increment(42)
        .block(vec![record(&[
            encode_long(1),
            encode_alpha("Ann", 20),
            vec![0u8; 30],
        ])])
}

#[test]
fn test_parses_table_header_fields() -> Result<(), DatabaseError> {
    let header = parse(customer(), "customer.db")?;

    assert_eq!(header.record_size, 54);
    assert_eq!(header.header_size, 2048);
    assert_eq!(header.block_size_bytes(), 1024);
    assert_eq!(header.row_count, 1);
    assert_eq!(header.used_blocks, 1);
    assert_eq!(header.first_block, 1);
    assert_eq!(header.field_count, 3);
    assert_eq!(header.auto_increment_value, 42);
    assert_eq!(header.table_name, "customer.db");
    assert_eq!(header.sort_order_id.as_deref(), Some("ascii"));
    assert_eq!(header.field_order, vec![1, 2, 3]);
    assert_eq!(header.block_offset(1), 2048);

    let names: Vec<&str> = header.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Id", "Name", "Notes"]);
    assert!(header.fields.iter().all(|f| f.table == "customer"));
    Ok(())
}

#[test]
fn test_memo_fields_report_logical_and_real_size() -> Result<(), DatabaseError> {
    let header = parse(customer(), "customer.db")?;
    let notes = header.field("notes").unwrap();
    assert_eq!(notes.real_size, 30);
    assert_eq!(notes.size, 20);
    Ok(())
}

#[test]
fn test_new_versions_read_code_page() -> Result<(), DatabaseError> {
    let header = parse(customer().code_page(1250), "customer.db")?;
    assert_eq!(header.code_page, 1250);
    assert_eq!(header.charset.name(), "windows-1250");
    assert!(header.warnings.is_empty());
    Ok(())
}

#[test]
fn test_old_versions_use_cp437_and_legacy_offset() -> Result<(), DatabaseError> {
    for version in [3u8, 4] {
        let header = parse(customer().version(version).code_page(1250), "customer.db")?;
        assert_eq!(header.charset, Charset::Cp437);
        assert_eq!(header.code_page, 437);
        assert_eq!(header.fields[1].name, "Name");
    }
    Ok(())
}

#[test]
fn test_version_7_uses_wide_table_name_slot() -> Result<(), DatabaseError> {
    let header = parse(customer().version(0x0C), "customer.db")?;
    assert_eq!(header.fields[2].name, "Notes");
    assert_eq!(header.sort_order_id.as_deref(), Some("ascii"));
    Ok(())
}

#[test]
fn test_misreported_code_page_is_remapped() -> Result<(), DatabaseError> {
    let remapped = parse(customer().code_page(0x1B5), "customer.db")?;
    let direct = parse(customer().code_page(0x4E4), "customer.db")?;
    assert_eq!(remapped.charset, direct.charset);
    assert_eq!(remapped.code_page, 0x1B5);
    Ok(())
}

#[test]
fn test_unknown_code_page_warns_and_falls_back() -> Result<(), DatabaseError> {
    let header = parse(customer().code_page(0x7777), "customer.db")?;
    assert_eq!(header.charset, Charset::Cp437);
    assert_eq!(
        header.warnings,
        vec![Warning::UnknownCharset { code_page: 0x7777 }]
    );
    Ok(())
}

#[test]
fn test_override_charset_wins() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let path = customer().code_page(1250).write_to(&dir)?;
    let mut file = File::open(path)?;
    let header = DataFileHeader::read_table(&mut file, "customer.db", Some(Charset::Cp850))?;
    assert_eq!(header.charset, Charset::Cp850);
    Ok(())
}

#[test]
fn test_names_are_decoded_with_table_charset() -> Result<(), DatabaseError> {
    let builder = TableFileBuilder::new("people.db")
        .code_page(437)
        .field("Stra\u{e1}e", 0x01, 10);
    let dir = TempDirectory::new()?;
    // 0xA0 is cp437 for U+00E1; the spare byte becomes a second terminator
    let mut bytes = builder.build();
    let utf8 = "Stra\u{e1}e".as_bytes();
    let position = bytes
        .windows(utf8.len())
        .position(|w| w == utf8)
        .unwrap();
    bytes[position..position + utf8.len()].copy_from_slice(b"Stra\xA0e\0");
    let path = dir.write("people.db", &bytes)?;
    let mut file = File::open(path)?;
    let header = DataFileHeader::read_table(&mut file, "people.db", None)?;
    assert_eq!(header.fields[0].name, "Stra\u{e1}e");
    Ok(())
}

#[test]
fn test_non_table_file_type_is_rejected() {
    let err = parse(customer().file_type(3), "customer.x02").unwrap_err();
    assert!(matches!(err, DatabaseError::InvalidHeader { .. }));
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_truncated_file_is_an_error() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let path = dir.write("short.db", &[0u8; 16])?;
    let mut file = File::open(path)?;
    assert!(matches!(
        DataFileHeader::read_table(&mut file, "short.db", None),
        Err(DatabaseError::InvalidHeader { .. })
    ));
    Ok(())
}
