use pxread::{
    config::ReadOptions,
    executor::{
        block_scan::BlockScanner,
        scan::{ScanIterator, Scanner},
    },
    storage::table::ParadoxTable,
    types::{error::DatabaseError, value::Value},
    utils::mock::{TableFileBuilder, TempDirectory, encode_alpha, encode_long, record},
};

fn numbered_table(dir: &TempDirectory, name: &str, rows: i32, per_block: usize) -> Result<ParadoxTable, DatabaseError> {
    let all: Vec<Vec<u8>> = (1..=rows)
        .map(|i| record(&[encode_long(i), encode_alpha(&format!("value_{i}"), 12)]))
        .collect();
    let mut builder = TableFileBuilder::new(name)
        .field("Id", 0x04, 4)
        .field("Value", 0x01, 12);
    for chunk in all.chunks(per_block) {
        builder = builder.block(chunk.to_vec());
    }
    let path = builder.write_to(dir)?;
    ParadoxTable::open(path, &ReadOptions::default())
}

fn ids(scanner: &mut BlockScanner) -> Result<Vec<i64>, DatabaseError> {
    let mut ids = Vec::new();
    while let Some(row) = scanner.scan()? {
        match row.values[0] {
            Value::Integer(id) => ids.push(id),
            ref other => panic!("expected integer id, got {other:?}"),
        }
    }
    Ok(ids)
}

#[test]
fn test_block_scanner_basic_functionality() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let table = numbered_table(&dir, "basic.db", 5, 2)?;
    let mut scanner = table.scanner(None)?;

    let first = scanner.scan()?.unwrap();
    assert_eq!(first.row_id, Some(1));
    assert_eq!(
        first.values,
        vec![Value::Integer(1), Value::Text("value_1".into())]
    );

    let mut rest = ids(&mut scanner)?;
    rest.insert(0, 1);
    assert_eq!(rest, vec![1, 2, 3, 4, 5]);
    assert_eq!(scanner.blocks_visited(), 3);
    Ok(())
}

#[test]
fn test_scanner_reset_functionality() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let table = numbered_table(&dir, "reset.db", 3, 2)?;
    let mut scanner = table.scanner(None)?;
    assert!(scanner.scan()?.is_some());

    scanner.reset()?;
    assert_eq!(ids(&mut scanner)?, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_batch_scanning() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let table = numbered_table(&dir, "batch.db", 10, 4)?;
    let mut scanner = table.scanner(None)?;

    let mut total_rows = 0;
    let mut batch_count = 0;
    loop {
        let batch = scanner.scan_batch(3)?;
        if batch.is_empty() {
            break;
        }
        batch_count += 1;
        total_rows += batch.len();
        if batch_count < 4 {
            assert_eq!(batch.len(), 3);
        }
    }
    assert_eq!(total_rows, 10);
    assert_eq!(batch_count, 4);
    Ok(())
}

#[test]
fn test_scan_iterator_wrapper() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let table = numbered_table(&dir, "iter.db", 5, 5)?;

    let rows: Result<Vec<_>, _> = ScanIterator::new(table.scanner(None)?).collect();
    let rows = rows?;
    assert_eq!(rows.len(), 5);
    let row_ids: Vec<u64> = rows.iter().filter_map(|r| r.row_id).collect();
    assert_eq!(row_ids, vec![1, 2, 3, 4, 5]);

    // independent scanners do not share position
    let count = ScanIterator::new(table.scanner(None)?).count();
    assert_eq!(count, 5);
    Ok(())
}

#[test]
fn test_scanner_with_large_dataset() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let table = numbered_table(&dir, "large.db", 2_000, 60)?;
    let mut scanner = table.scanner(Some(&["id"][..]))?;
    let ids = ids(&mut scanner)?;
    assert_eq!(ids.len(), 2_000);
    assert!(ids.iter().zip(1..).all(|(id, expected)| *id == expected));
    Ok(())
}

#[test]
fn test_scanner_with_empty_table() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let path = TableFileBuilder::new("empty.db")
        .field("Id", 0x04, 4)
        .write_to(&dir)?;
    let mut scanner = BlockScanner::open(path, None, None)?;
    assert!(scanner.scan()?.is_none());
    assert!(scanner.scan_batch(10)?.is_empty());
    Ok(())
}

#[test]
fn test_scanner_nonexistent_column() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let table = numbered_table(&dir, "columns.db", 1, 1)?;
    assert!(matches!(
        table.scanner(Some(&["missing"][..])),
        Err(DatabaseError::ColumnNotFound { .. })
    ));
    Ok(())
}
