use pxread::{
    storage::{
        blob::{BlobReference, BlobSession},
        charset::Charset,
    },
    types::{
        error::{DatabaseError, ErrorKind},
        value::LobValue,
    },
    utils::mock::{BlobFileBuilder, TempDirectory},
};

fn memo(reference: BlobReference, length: u32) -> LobValue {
    LobValue {
        leader: b"Lorem".to_vec(),
        length,
        modifier: 0,
        reference: Some(reference),
        text: true,
    }
}

#[test]
fn test_resolves_single_block() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut blob = BlobFileBuilder::new();
    let reference = blob.single(b"Lorem ipsum dolor sit amet");
    blob.write_to(&dir, "notes.mb")?;

    let mut session = BlobSession::new(dir.path().join("notes.db"));
    assert_eq!(session.resolve(reference)?, b"Lorem ipsum dolor sit amet");
    assert_eq!(session.blob_path(), Some(dir.path().join("notes.mb").as_path()));
    Ok(())
}

#[test]
fn test_repeated_resolution_hits_cache_without_seeking() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut blob = BlobFileBuilder::new();
    let small = blob.sub_block(&[Some(&b"first"[..]), Some(&b"second"[..])]);
    let large = blob.single(&[7u8; 600]);
    blob.write_to(&dir, "notes.mb")?;

    let mut session = BlobSession::new(dir.path().join("notes.db"));
    let first = session.resolve(large)?;
    let after_first = session.stats();
    let second = session.resolve(large)?;
    let after_second = session.stats();

    assert_eq!(first, second);
    assert_eq!(after_second.seeks, after_first.seeks);
    assert_eq!(after_second.cache_hits, after_first.cache_hits + 1);

    // sub-block entries were cached on the way to the single block
    let Some(second_slot) = small[1] else {
        panic!("slot 1 was written");
    };
    assert_eq!(session.resolve(second_slot)?, b"second");
    assert_eq!(session.stats().seeks, after_first.seeks);
    Ok(())
}

#[test]
fn test_deleted_sub_block_entries_are_skipped() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut blob = BlobFileBuilder::new();
    let refs = blob.sub_block(&[Some(&b"alpha"[..]), None, Some(&b"gamma"[..])]);
    blob.write_to(&dir, "notes.mb")?;

    let mut session = BlobSession::new(dir.path().join("notes.db"));
    let Some(gamma) = refs[2] else {
        panic!("slot 2 was written");
    };
    assert_eq!(session.resolve(gamma)?, b"gamma");
    assert_eq!(session.cached_blocks(), 2);

    // the deleted slot has the same block but is never cached
    let deleted = BlobReference::new((gamma.raw() & 0xFFFF_FF00) | 1);
    assert!(matches!(
        session.resolve(deleted),
        Err(DatabaseError::BlobNotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_free_blocks_are_stepped_over() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut blob = BlobFileBuilder::new();
    blob.free(1);
    let reference = blob.single(b"after the gap");
    blob.write_to(&dir, "notes.mb")?;

    let mut session = BlobSession::new(dir.path().join("notes.db"));
    assert_eq!(reference.block_number(), 2);
    assert_eq!(session.resolve(reference)?, b"after the gap");
    assert_eq!(session.stats().blocks_read, 2);
    Ok(())
}

#[test]
fn test_lob_is_truncated_to_row_length_and_decoded() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut blob = BlobFileBuilder::new();
    let reference = blob.single(b"Lorem ipsum\0padding");
    blob.write_to(&dir, "notes.mb")?;

    let mut session = BlobSession::new(dir.path().join("notes.db"));
    assert_eq!(session.resolve_lob(&memo(reference, 11))?, b"Lorem ipsum");
    assert_eq!(
        session.resolve_text(&memo(reference, 19), Charset::Cp437)?,
        "Lorem ipsum"
    );
    Ok(())
}

#[test]
fn test_inline_lob_never_opens_blob_file() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut session = BlobSession::new(dir.path().join("notes.db"));
    let inline = LobValue {
        leader: b"short\0\0\0".to_vec(),
        length: 5,
        modifier: 0,
        reference: None,
        text: true,
    };
    assert_eq!(session.resolve_lob(&inline)?, b"short");
    assert_eq!(session.blob_path(), None);
    Ok(())
}

#[test]
fn test_missing_reference_reaches_end_of_file() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut blob = BlobFileBuilder::new();
    blob.single(b"only");
    blob.write_to(&dir, "notes.mb")?;

    let mut session = BlobSession::new(dir.path().join("notes.db"));
    let err = session.resolve(BlobReference::new(0x5000 | 0xFF)).unwrap_err();
    assert!(matches!(err, DatabaseError::BlobNotFound { .. }));
    Ok(())
}

#[test]
fn test_invalid_blob_header() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut blob = BlobFileBuilder::new().invalid_header();
    let reference = blob.single(b"data");
    blob.write_to(&dir, "notes.mb")?;

    let mut session = BlobSession::new(dir.path().join("notes.db"));
    assert!(matches!(
        session.resolve(reference),
        Err(DatabaseError::InvalidBlobHeader { .. })
    ));
    Ok(())
}

#[test]
fn test_companion_must_exist_exactly_once() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let reference = BlobReference::new(0x10FF);

    let mut missing = BlobSession::new(dir.path().join("notes.db"));
    let err = missing.resolve(reference).unwrap_err();
    assert!(matches!(err, DatabaseError::CompanionNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::Lookup);

    let blob = BlobFileBuilder::new();
    blob.write_to(&dir, "notes.mb")?;
    blob.write_to(&dir, "NOTES.MB")?;
    let mut ambiguous = BlobSession::new(dir.path().join("notes.db"));
    assert!(matches!(
        ambiguous.resolve(reference),
        Err(DatabaseError::CompanionAmbiguous { .. })
    ));
    Ok(())
}

#[test]
fn test_clear_restarts_discovery() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut blob = BlobFileBuilder::new();
    let reference = blob.single(b"data");
    blob.write_to(&dir, "notes.mb")?;

    let mut session = BlobSession::new(dir.path().join("notes.db"));
    session.resolve(reference)?;
    session.clear();
    assert_eq!(session.cached_blocks(), 0);
    assert_eq!(session.resolve(reference)?, b"data");
    Ok(())
}

#[test]
fn test_single_block_length_cannot_reach_next_block() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut blob = BlobFileBuilder::new();
    let first = blob.single(b"first block");
    blob.single(b"NEXT-BLOCK-PAYLOAD");
    let mut bytes = blob.build();
    // length field of the first block, which spans a single chunk
    bytes[4096 + 3..4096 + 7].copy_from_slice(&5000u32.to_le_bytes());
    dir.write("notes.mb", &bytes)?;

    let mut session = BlobSession::new(dir.path().join("notes.db"));
    let err = session.resolve(first).unwrap_err();
    assert!(matches!(err, DatabaseError::CorruptedBlock { .. }));
    assert_eq!(err.kind(), ErrorKind::Format);
    Ok(())
}

#[test]
fn test_sub_block_entry_must_fit_its_block() -> Result<(), DatabaseError> {
    let dir = TempDirectory::new()?;
    let mut blob = BlobFileBuilder::new();
    let refs = blob.sub_block(&[Some(&b"short"[..])]);
    blob.single(b"NEXT-BLOCK-PAYLOAD");
    let mut bytes = blob.build();
    // rounded length of entry 0 now claims 254 × 16 bytes
    bytes[4096 + 12 + 1] = 0xFF;
    dir.write("notes.mb", &bytes)?;

    let Some(short) = refs[0] else {
        panic!("slot 0 was written");
    };
    let mut session = BlobSession::new(dir.path().join("notes.db"));
    assert!(matches!(
        session.resolve(short),
        Err(DatabaseError::CorruptedBlock { .. })
    ));
    Ok(())
}
