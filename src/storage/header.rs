use std::io::{Read, Seek, SeekFrom};

use crate::{
    storage::{
        buffer::ByteCursor,
        charset::{Charset, DEFAULT_CODE_PAGE, resolve_charset},
    },
    types::{BLOCK_UNIT, INITIAL_HEADER_CHUNK, error::DatabaseError, error::Warning, field::Field},
};

pub const FILE_TYPE_INDEXED_TABLE: u8 = 0;
pub const FILE_TYPE_PRIMARY_INDEX: u8 = 1;
pub const FILE_TYPE_TABLE: u8 = 2;

const FIELD_COUNT_OFFSET: usize = 0x21;
const ENCRYPTION_OFFSET: usize = 0x25;
const WRITE_PROTECT_OFFSET: usize = 0x38;
const AUTO_INCREMENT_OFFSET: usize = 0x49;
const REFERENTIAL_INTEGRITY_OFFSET: usize = 0x55;

/// Table-name slot widths that sit between the field pointers and the field names.
const TABLE_NAME_WIDTH: usize = 79;
const TABLE_NAME_WIDTH_V7: usize = 261;
const VERSION_7: u8 = 0x0C;

/*
 * Paradox data file header (little-endian)
 * ┌──────────────────────────────────────────────────────────────────┐
 * │ 0x00 recordSize(2) headerSize(2) type(1) blockSize(1)            │
 * │ 0x06 rowCount(4) usedBlocks(2) totalBlocks(2)                    │
 * │ 0x0E firstBlock(2) lastBlock(2)                                  │
 * │ 0x21 fieldCount(2) primaryFieldCount(2) encryption(4)            │
 * │ 0x38 writeProtected(1) versionId(1)                              │
 * │ 0x49 autoIncrement(4) firstFreeBlock(2)                          │
 * │ 0x55 referentialIntegrity(1)                                     │
 * │ 0x6A codePage(2)                       (versionId > 4 only)      │
 * ├──────────────────────────────────────────────────────────────────┤
 * │ base: fieldCount × [type(1) size(1)]   base = 0x58 or 0x78       │
 * │ tableNamePtr(4) fieldNamePtrs(4 × fieldCount)                    │
 * │ tableName (79 or 261 bytes)                                      │
 * │ fieldName\0 × fieldCount                                         │
 * │ fieldOrder(2) × fieldCount                                       │
 * │ sortOrderId\0                                                    │
 * └──────────────────────────────────────────────────────────────────┘
 */

#[derive(Debug, Clone, PartialEq)]
pub struct DataFileHeader {
    pub file_name: String,
    pub record_size: u16,
    pub header_size: u16,
    pub file_type: u8,
    /// In 1 KiB units.
    pub block_size: u8,
    pub row_count: u32,
    pub used_blocks: u16,
    pub total_blocks: u16,
    pub first_block: u16,
    pub last_block: u16,
    pub field_count: u16,
    pub primary_field_count: u16,
    pub encryption: u32,
    pub write_protected: bool,
    pub version_id: u8,
    pub auto_increment_value: u32,
    pub first_free_block: u16,
    pub referential_integrity: bool,
    pub code_page: u16,
    pub charset: Charset,
    pub fields: Vec<Field>,
    pub field_order: Vec<u16>,
    pub table_name: String,
    pub sort_order_id: Option<String>,
    pub warnings: Vec<Warning>,
}

impl DataFileHeader {
    pub fn block_size_bytes(&self) -> usize {
        self.block_size as usize * BLOCK_UNIT
    }

    /// File offset of a 1-based block number.
    pub fn block_offset(&self, block: u16) -> u64 {
        self.header_size as u64 + (block as u64 - 1) * self.block_size_bytes() as u64
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption != 0
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.is_named(name))
    }

    /// Reads and parses the header of a `.DB` table file.
    pub fn read_table<R: Read + Seek>(
        reader: &mut R,
        file_name: &str,
        charset_override: Option<Charset>,
    ) -> Result<Self, DatabaseError> {
        let chunk = read_chunk(reader, INITIAL_HEADER_CHUNK)?;
        let mut cursor = ByteCursor::new(&chunk);

        let mut header = parse_prologue(&mut cursor, file_name)?;
        if header.file_type != FILE_TYPE_INDEXED_TABLE && header.file_type != FILE_TYPE_TABLE {
            return Err(DatabaseError::invalid_header(
                file_name,
                format!("file type {} is not a table", header.file_type),
            ));
        }
        if header.record_size == 0 {
            return Err(DatabaseError::invalid_header(file_name, "record size is zero"));
        }

        let base = apply_charset(&mut cursor, &mut header, charset_override)?;
        let types = read_field_types(&mut cursor, header.field_count)?;

        // Field names may live beyond the initial chunk; re-read the whole header.
        let full = read_exact_header(reader, &header)?;
        let mut cursor = ByteCursor::new(&full);
        read_field_descriptors(&mut cursor, &mut header, &types, base)?;
        header.sort_order_id = read_optional_string(&mut cursor, header.charset);

        let declared: u32 = header.fields.iter().map(|f| f.real_size as u32).sum();
        if declared != header.record_size as u32 {
            log::debug!(
                "{}: field sizes sum to {} but record size is {}",
                file_name,
                declared,
                header.record_size
            );
        }

        log::debug!(
            "parsed table header {}: version=0x{:02X} fields={} rows={} blocks={}",
            file_name,
            header.version_id,
            header.field_count,
            header.row_count,
            header.used_blocks
        );
        Ok(header)
    }
}

/// Reads up to `len` bytes from the start of the file (shorter files yield less).
pub fn read_chunk<R: Read + Seek>(reader: &mut R, len: usize) -> Result<Vec<u8>, DatabaseError> {
    reader.seek(SeekFrom::Start(0))?;
    let mut buffer = Vec::with_capacity(len);
    reader.by_ref().take(len as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Reads exactly `header_size` bytes from the start of the file.
pub fn read_exact_header<R: Read + Seek>(
    reader: &mut R,
    header: &DataFileHeader,
) -> Result<Vec<u8>, DatabaseError> {
    reader.seek(SeekFrom::Start(0))?;
    let mut buffer = vec![0u8; header.header_size as usize];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Parses the fixed-offset part shared by table, index and primary key files.
pub fn parse_prologue(
    cursor: &mut ByteCursor<'_>,
    file_name: &str,
) -> Result<DataFileHeader, DatabaseError> {
    if cursor.len() < 0x58 {
        return Err(DatabaseError::invalid_header(
            file_name,
            format!("header too short ({} bytes)", cursor.len()),
        ));
    }

    cursor.seek(0)?;
    let record_size = cursor.read_u16()?;
    let header_size = cursor.read_u16()?;
    let file_type = cursor.read_u8()?;
    let block_size = cursor.read_u8()?;
    let row_count = cursor.read_u32()?;
    let used_blocks = cursor.read_u16()?;
    let total_blocks = cursor.read_u16()?;
    let first_block = cursor.read_u16()?;
    let last_block = cursor.read_u16()?;

    cursor.seek(FIELD_COUNT_OFFSET)?;
    let field_count = cursor.read_u16()?;
    let primary_field_count = cursor.read_u16()?;

    cursor.seek(ENCRYPTION_OFFSET)?;
    let encryption = cursor.read_u32()?;

    cursor.seek(WRITE_PROTECT_OFFSET)?;
    let write_protected = cursor.read_u8()? != 0;
    let version_id = cursor.read_u8()?;

    cursor.seek(AUTO_INCREMENT_OFFSET)?;
    let auto_increment_value = cursor.read_u32()?;
    let first_free_block = cursor.read_u16()?;

    cursor.seek(REFERENTIAL_INTEGRITY_OFFSET)?;
    let referential_integrity = cursor.read_u8()? != 0;

    if block_size == 0 && used_blocks > 0 {
        return Err(DatabaseError::invalid_header(file_name, "block size is zero"));
    }
    if (header_size as usize) < 0x58 {
        return Err(DatabaseError::invalid_header(
            file_name,
            format!("header size {header_size} is smaller than the fixed prologue"),
        ));
    }

    Ok(DataFileHeader {
        file_name: file_name.to_string(),
        record_size,
        header_size,
        file_type,
        block_size,
        row_count,
        used_blocks,
        total_blocks,
        first_block,
        last_block,
        field_count,
        primary_field_count,
        encryption,
        write_protected,
        version_id,
        auto_increment_value,
        first_free_block,
        referential_integrity,
        code_page: DEFAULT_CODE_PAGE,
        charset: Charset::default(),
        fields: Vec::new(),
        field_order: Vec::new(),
        table_name: String::new(),
        sort_order_id: None,
        warnings: Vec::new(),
    })
}

/// Resolves the charset into the header and returns the field array offset.
pub fn apply_charset(
    cursor: &mut ByteCursor<'_>,
    header: &mut DataFileHeader,
    charset_override: Option<Charset>,
) -> Result<usize, DatabaseError> {
    let resolved = resolve_charset(cursor, header.version_id, charset_override)?;
    header.charset = resolved.charset;
    header.code_page = resolved.code_page;
    header.warnings.extend(resolved.warning);
    Ok(cursor.position())
}

/// Reads `count` (type, size) pairs. Sizes are unsigned bytes.
pub fn read_field_types(
    cursor: &mut ByteCursor<'_>,
    count: u16,
) -> Result<Vec<(u8, u16)>, DatabaseError> {
    let mut types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let tag = cursor.read_u8()?;
        let size = cursor.read_u8()? as u16;
        types.push((tag, size));
    }
    Ok(types)
}

fn table_name_width(version_id: u8) -> usize {
    if version_id == VERSION_7 {
        TABLE_NAME_WIDTH_V7
    } else {
        TABLE_NAME_WIDTH
    }
}

/// Offset of the first field name: `base + 83 + 6n` (or `base + 265 + 6n` for version 0x0C).
pub fn field_names_offset(base: usize, version_id: u8, field_count: u16) -> usize {
    base + 4 + 6 * field_count as usize + table_name_width(version_id)
}

/// Reads table name, field names and field order, then builds the field list.
pub fn read_field_descriptors(
    cursor: &mut ByteCursor<'_>,
    header: &mut DataFileHeader,
    types: &[(u8, u16)],
    base: usize,
) -> Result<(), DatabaseError> {
    let width = table_name_width(header.version_id);
    let names_offset = field_names_offset(base, header.version_id, types.len() as u16);
    cursor.seek(names_offset - width)?;
    header.table_name = header.charset.decode(cursor.read_fixed_cstr(width)?);

    let owner = table_stem(&header.file_name);
    let mut fields = Vec::with_capacity(types.len());
    for (i, &(tag, size)) in types.iter().enumerate() {
        let name = header.charset.decode(cursor.read_cstr()?);
        fields.push(Field::new(i as u16 + 1, tag, size, name, owner.clone()));
    }

    let mut order = Vec::with_capacity(types.len());
    for _ in 0..types.len() {
        order.push(cursor.read_u16()?);
    }

    header.fields = fields;
    header.field_order = order;
    Ok(())
}

/// A trailing NUL-terminated string that older writers may omit.
pub fn read_optional_string(cursor: &mut ByteCursor<'_>, charset: Charset) -> Option<String> {
    cursor
        .read_cstr()
        .ok()
        .map(|bytes| charset.decode(bytes))
        .filter(|s| !s.is_empty())
}

/// File name without directory or extension, as used to label fields.
pub fn table_stem(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}
