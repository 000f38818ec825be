use serde::{Deserialize, Serialize};

use crate::types::{BLOB_POINTER_SIZE, error::DatabaseError, value::DataType};

/// Paradox field type tags. Lookup is by exact tag; there is no fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Alpha = 0x01,
    Date = 0x02,
    Short = 0x03,
    Long = 0x04,
    Currency = 0x05,
    Number = 0x06,
    Logical = 0x09,
    Memo = 0x0C,
    Blob = 0x0D,
    FormattedMemo = 0x0E,
    Ole = 0x0F,
    Graphic = 0x10,
    Time = 0x14,
    Timestamp = 0x15,
    AutoIncrement = 0x16,
    Bytes = 0x18,
}

impl FieldType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(FieldType::Alpha),
            0x02 => Some(FieldType::Date),
            0x03 => Some(FieldType::Short),
            0x04 => Some(FieldType::Long),
            0x05 => Some(FieldType::Currency),
            0x06 => Some(FieldType::Number),
            0x09 => Some(FieldType::Logical),
            0x0C => Some(FieldType::Memo),
            0x0D => Some(FieldType::Blob),
            0x0E => Some(FieldType::FormattedMemo),
            0x0F => Some(FieldType::Ole),
            0x10 => Some(FieldType::Graphic),
            0x14 => Some(FieldType::Time),
            0x15 => Some(FieldType::Timestamp),
            0x16 => Some(FieldType::AutoIncrement),
            0x18 => Some(FieldType::Bytes),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Types whose row slot ends in a 10-byte pointer into the blob file.
    pub fn is_lob(&self) -> bool {
        matches!(
            self,
            FieldType::Memo
                | FieldType::Blob
                | FieldType::FormattedMemo
                | FieldType::Ole
                | FieldType::Graphic
        )
    }

    pub fn is_text_lob(&self) -> bool {
        matches!(self, FieldType::Memo | FieldType::FormattedMemo)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            FieldType::Alpha => DataType::Text,
            FieldType::Date => DataType::Date,
            FieldType::Short | FieldType::Long | FieldType::AutoIncrement => DataType::Integer,
            FieldType::Currency | FieldType::Number => DataType::Real,
            FieldType::Logical => DataType::Boolean,
            FieldType::Memo | FieldType::FormattedMemo => DataType::Clob,
            FieldType::Blob | FieldType::Ole | FieldType::Graphic | FieldType::Bytes => {
                DataType::Blob
            }
            FieldType::Time => DataType::Time,
            FieldType::Timestamp => DataType::Timestamp,
        }
    }
}

/// Column descriptor from a table, index or validation header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// 1-based position in the owning file.
    pub order: u16,
    pub type_tag: u8,
    /// Logical size. For lob types this excludes the trailing pointer.
    pub size: u16,
    /// Bytes the field occupies inside a row.
    pub real_size: u16,
    pub name: String,
    pub table: String,
}

impl Field {
    /// Builds a descriptor from the on-disk type/size pair.
    pub fn new(order: u16, type_tag: u8, on_disk_size: u16, name: String, table: String) -> Self {
        let size = match FieldType::from_u8(type_tag) {
            Some(ft) if ft.is_lob() => on_disk_size.saturating_sub(BLOB_POINTER_SIZE as u16),
            _ => on_disk_size,
        };
        Self {
            order,
            type_tag,
            size,
            real_size: on_disk_size,
            name,
            table,
        }
    }

    /// Placeholder used when a view references a column that cannot be resolved.
    pub fn unknown(name: &str, table: &str) -> Self {
        Self {
            order: 0,
            type_tag: 0,
            size: 0,
            real_size: 0,
            name: name.to_string(),
            table: table.to_string(),
        }
    }

    pub fn field_type(&self) -> Option<FieldType> {
        FieldType::from_u8(self.type_tag)
    }

    pub fn require_type(&self) -> Result<FieldType, DatabaseError> {
        self.field_type()
            .ok_or_else(|| DatabaseError::UnsupportedFieldType {
                tag: self.type_tag,
                field: self.name.clone(),
            })
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.table.eq_ignore_ascii_case(&other.table)
    }
}

impl Eq for Field {}

impl Default for Field {
    fn default() -> Self {
        Field::unknown("", "")
    }
}
