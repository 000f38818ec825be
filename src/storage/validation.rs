//! Validation (`.VAL`) files: per-column minimum, maximum, default and edit mask.
//!
//! Validation data is best-effort. Any structural problem is reported as a
//! warning and yields no data instead of failing the owning table.

use std::io::{Read, Seek, SeekFrom};

use crate::{
    storage::{
        buffer::{ByteCursor, Endian},
        charset::Charset,
        decoder::decode_value,
    },
    types::{
        error::{DatabaseError, Warning, WithWarnings},
        field::Field,
        value::Value,
    },
};

pub const DEFAULT_VALIDATION_EXTENSION: &str = "val";

const VERSION_OFFSET: usize = 0x01;
const FOOTER_POINTER_OFFSET: usize = 0x09;
const ENTRIES_OFFSET: usize = 0x35;
const ENTRY_HINTS_OFFSET: usize = 0x0C;
const ENTRY_VALUES_OFFSET: usize = ENTRY_HINTS_OFFSET + 16;
const FOOTER_UNKNOWN_BYTES: usize = 4;
const ORIGINAL_TABLE_NAME_WIDTH: usize = 0x4F;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationEntry {
    pub field_name: String,
    /// The owning table's descriptor for this column.
    pub field: Field,
    pub type_hint: u8,
    pub size_hint: u8,
    pub minimum: Option<Value>,
    pub maximum: Option<Value>,
    pub default: Option<Value>,
    pub mask: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationData {
    pub version: u8,
    pub original_table_name: String,
    /// Table field numbers (1-based) in footer order.
    pub field_order: Vec<u16>,
    pub entries: Vec<ValidationEntry>,
}

impl ValidationData {
    pub fn entry(&self, field_name: &str) -> Option<&ValidationEntry> {
        self.entries
            .iter()
            .find(|e| e.field_name.eq_ignore_ascii_case(field_name))
    }
}

struct FooterField {
    name: String,
    type_hint: u8,
    size_hint: u8,
    field: Field,
}

/// Reads a validation file, downgrading every failure to a warning.
pub fn read_validation<R: Read + Seek>(
    reader: &mut R,
    file_name: &str,
    table_fields: &[Field],
    charset: Charset,
) -> WithWarnings<Option<ValidationData>> {
    let bytes = match read_all(reader) {
        Ok(bytes) => bytes,
        Err(e) => return downgrade(file_name, e),
    };
    match parse_validation(&bytes, file_name, table_fields, charset) {
        Ok(data) => WithWarnings::new(Some(data)),
        Err(e) => downgrade(file_name, e),
    }
}

fn downgrade(file_name: &str, error: DatabaseError) -> WithWarnings<Option<ValidationData>> {
    WithWarnings::with_warning(
        None,
        Warning::Validation {
            file: file_name.to_string(),
            reason: error.to_string(),
        },
    )
}

fn read_all<R: Read + Seek>(reader: &mut R) -> Result<Vec<u8>, DatabaseError> {
    reader.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Strict parser; callers wanting best-effort behaviour use `read_validation`.
pub fn parse_validation(
    bytes: &[u8],
    file_name: &str,
    table_fields: &[Field],
    charset: Charset,
) -> Result<ValidationData, DatabaseError> {
    let mut cursor = ByteCursor::new(bytes);

    cursor.seek(VERSION_OFFSET)?;
    let version = cursor.read_u8()?;
    let entry_count = cursor.read_u16()?;
    cursor.seek(FOOTER_POINTER_OFFSET)?;
    let footer_offset = cursor.read_u32()? as usize;

    let (original_table_name, field_order, footer_fields) =
        read_footer(&mut cursor, footer_offset, file_name, table_fields, charset)?;

    cursor.seek(ENTRIES_OFFSET)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(read_entry(&mut cursor, &footer_fields, charset)?);
    }

    log::debug!(
        "parsed validation {}: {} entries for {}",
        file_name,
        entries.len(),
        original_table_name
    );
    Ok(ValidationData {
        version,
        original_table_name,
        field_order,
        entries,
    })
}

fn read_footer(
    cursor: &mut ByteCursor<'_>,
    footer_offset: usize,
    file_name: &str,
    table_fields: &[Field],
    charset: Charset,
) -> Result<(String, Vec<u16>, Vec<FooterField>), DatabaseError> {
    cursor.seek(footer_offset)?;
    let field_count = cursor.read_u16()? as usize;
    cursor.skip(FOOTER_UNKNOWN_BYTES)?;

    let mut field_order = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        field_order.push(cursor.read_u16()?);
    }

    let types_position = cursor.position();
    cursor.skip(field_count * 2)?;

    let original_table_name = charset.decode(cursor.read_fixed_cstr(ORIGINAL_TABLE_NAME_WIDTH)?);

    let mut names = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        names.push(charset.decode(cursor.read_cstr()?));
    }

    cursor.seek(types_position)?;
    let mut fields = Vec::with_capacity(field_count);
    for name in names {
        let type_hint = cursor.read_u8()?;
        let size_hint = cursor.read_u8()?;
        let field = table_fields
            .iter()
            .find(|f| f.is_named(&name))
            .cloned()
            .ok_or_else(|| DatabaseError::ColumnNotFound {
                name: name.clone(),
                table: file_name.to_string(),
            })?;
        fields.push(FooterField {
            name,
            type_hint,
            size_hint,
            field,
        });
    }

    Ok((original_table_name, field_order, fields))
}

/// Decodes one value per non-zero hint, in minimum, maximum, default order.
fn read_hinted_values(
    cursor: &mut ByteCursor<'_>,
    field: &Field,
    charset: Charset,
    hints: [u32; 3],
) -> Result<[Option<Value>; 3], DatabaseError> {
    let mut values = [None, None, None];
    for (slot, hint) in values.iter_mut().zip(hints) {
        if hint != 0 {
            *slot = Some(decode_value(cursor, field, charset)?);
        }
    }
    Ok(values)
}

fn read_entry(
    cursor: &mut ByteCursor<'_>,
    fields: &[FooterField],
    charset: Charset,
) -> Result<ValidationEntry, DatabaseError> {
    let entry_start = cursor.position();
    let field_index = cursor.read_u8()? as usize;
    let mask_size = (cursor.read_u8()? & 0x0F) as usize;

    let footer = fields.get(field_index).ok_or_else(|| DatabaseError::ColumnNotFound {
        name: format!("#{field_index}"),
        table: String::new(),
    })?;

    cursor.seek(entry_start + ENTRY_HINTS_OFFSET)?;
    let minimum_hint = cursor.read_u32()?;
    let maximum_hint = cursor.read_u32()?;
    let default_hint = cursor.read_u32()?;
    let mask_hint = cursor.read_u32()?;
    debug_assert_eq!(cursor.position(), entry_start + ENTRY_VALUES_OFFSET);

    // Values use the same big-endian encoding as row payloads.
    cursor.set_order(Endian::Big);
    let values = read_hinted_values(
        cursor,
        &footer.field,
        charset,
        [minimum_hint, maximum_hint, default_hint],
    );
    cursor.set_order(Endian::Little);
    let [minimum, maximum, default] = values?;

    let mask = if mask_size > 0 && mask_hint != 0 {
        let raw = cursor.read_bytes(mask_size)?;
        Some(charset.decode(&raw[..mask_size - 1]))
    } else {
        None
    };

    Ok(ValidationEntry {
        field_name: footer.name.clone(),
        field: footer.field.clone(),
        type_hint: footer.type_hint,
        size_hint: footer.size_hint,
        minimum,
        maximum,
        default,
        mask,
    })
}
