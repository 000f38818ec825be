use std::io::Cursor;

use pxread::{
    config::ReadOptions,
    storage::{
        charset::Charset,
        table::ParadoxTable,
        validation::{parse_validation, read_validation},
    },
    types::{
        error::{DatabaseError, Warning},
        field::Field,
        value::Value,
    },
    utils::mock::{
        TableFileBuilder, TempDirectory, ValidationEntrySpec, ValidationFileBuilder,
        encode_alpha, encode_short,
    },
};

fn products() -> TableFileBuilder {
    TableFileBuilder::new("products.db")
        .field("Name", 0x01, 12)
        .field("Qty", 0x03, 2)
        .field("Code", 0x17, 17)
}

fn table_fields() -> Vec<Field> {
    vec![
        Field::new(1, 0x01, 12, "Name".into(), "products".into()),
        Field::new(2, 0x03, 2, "Qty".into(), "products".into()),
        Field::new(3, 0x17, 17, "Code".into(), "products".into()),
    ]
}

fn constraints() -> ValidationFileBuilder {
    ValidationFileBuilder::new("PRODUCTS.DB")
        .field("Name", 0x01, 12)
        .field("Qty", 0x03, 2)
        .field("Code", 0x17, 17)
        .entry(ValidationEntrySpec {
            field_index: 1,
            minimum: Some(encode_short(1)),
            maximum: Some(encode_short(100)),
            default: Some(encode_short(10)),
            mask: None,
        })
        .entry(ValidationEntrySpec {
            field_index: 0,
            default: Some(encode_alpha("widget", 12)),
            mask: Some("!aaa".into()),
            ..Default::default()
        })
}

#[test]
fn test_parses_entries_and_footer() -> Result<(), DatabaseError> {
    let data = parse_validation(&constraints().build(), "products.val", &table_fields(), Charset::Cp437)?;

    assert_eq!(data.version, 0x09);
    assert_eq!(data.original_table_name, "PRODUCTS.DB");
    assert_eq!(data.field_order, vec![1, 2, 3]);
    assert_eq!(data.entries.len(), 2);

    let qty = data.entry("qty").unwrap();
    assert_eq!(qty.type_hint, 0x03);
    assert_eq!(qty.size_hint, 2);
    assert_eq!(qty.minimum, Some(Value::Integer(1)));
    assert_eq!(qty.maximum, Some(Value::Integer(100)));
    assert_eq!(qty.default, Some(Value::Integer(10)));
    assert_eq!(qty.mask, None);

    let name = data.entry("Name").unwrap();
    assert_eq!(name.minimum, None);
    assert_eq!(name.maximum, None);
    assert_eq!(name.default, Some(Value::Text("widget".into())));
    assert_eq!(name.mask.as_deref(), Some("!aaa"));
    Ok(())
}

#[test]
fn test_zero_hints_skip_decoding() -> Result<(), DatabaseError> {
    // Code is a BCD column, which cannot be decoded; absent hints must not try
    let builder = constraints().entry(ValidationEntrySpec {
        field_index: 2,
        ..Default::default()
    });
    let data = parse_validation(&builder.build(), "products.val", &table_fields(), Charset::Cp437)?;
    let code = data.entry("Code").unwrap();
    assert_eq!((&code.minimum, &code.maximum, &code.default), (&None, &None, &None));
    assert_eq!(code.mask, None);
    Ok(())
}

#[test]
fn test_undecodable_value_becomes_warning() {
    let builder = constraints().entry(ValidationEntrySpec {
        field_index: 2,
        minimum: Some(vec![0u8; 17]),
        ..Default::default()
    });
    let mut reader = Cursor::new(builder.build());
    let result = read_validation(&mut reader, "products.val", &table_fields(), Charset::Cp437);
    assert!(result.value.is_none());
    assert!(matches!(result.warnings.as_slice(), [Warning::Validation { .. }]));
}

#[test]
fn test_unknown_column_becomes_warning() {
    let builder = ValidationFileBuilder::new("PRODUCTS.DB").field("Colour", 0x01, 10);
    let mut reader = Cursor::new(builder.build());
    let result = read_validation(&mut reader, "products.val", &table_fields(), Charset::Cp437);
    assert!(result.value.is_none());
    match result.warnings.as_slice() {
        [Warning::Validation { file, reason }] => {
            assert_eq!(file, "products.val");
            assert!(reason.contains("Colour"));
        }
        other => panic!("unexpected warnings {other:?}"),
    }
}

#[test]
fn test_truncated_file_becomes_warning() {
    let mut bytes = constraints().build();
    bytes.truncate(0x40);
    let mut reader = Cursor::new(bytes);
    let result = read_validation(&mut reader, "products.val", &table_fields(), Charset::Cp437);
    assert!(result.value.is_none());
    assert!(result.has_warnings());
}

#[test]
fn test_table_loads_validation_companion() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let path = products().write_to(&dir)?;
    constraints().write_to(&dir, "products.val")?;

    let table = ParadoxTable::open(path, &ReadOptions::default())?;
    let validation = table.load_validation();
    assert!(!validation.has_warnings());
    let data = validation.value.unwrap();
    assert_eq!(data.entries.len(), 2);
    assert_eq!(data.entries[0].field.table, "products");
    Ok(())
}
