use std::io::{Read, Seek};

use crate::{
    storage::{
        buffer::ByteCursor,
        charset::Charset,
        header::{
            DataFileHeader, FILE_TYPE_PRIMARY_INDEX, apply_charset, parse_prologue, read_chunk,
            read_field_descriptors, read_field_types, read_optional_string, table_stem,
        },
    },
    types::{error::DatabaseError, field::Field},
};

/// File types of secondary index (`.Xnn` / `.XGn`) files.
pub const INDEX_FILE_TYPES: [u8; 4] = [3, 5, 6, 8];

const INDEX_FIELD_NUMBER_OFFSET: usize = 0x15;
const INDEX_ROOT_OFFSET: usize = 0x1E;
const MIN_HEADER: usize = 0x58;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexHeader {
    pub header: DataFileHeader,
    pub name: Option<String>,
}

impl IndexHeader {
    pub fn is_valid(&self) -> bool {
        INDEX_FILE_TYPES.contains(&self.header.file_type)
    }

    pub fn sort_order_id(&self) -> Option<&str> {
        self.header.sort_order_id.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.header.fields
    }

    /// Parses a secondary index header: field table, sort order and display name.
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        file_name: &str,
        charset_override: Option<Charset>,
    ) -> Result<Self, DatabaseError> {
        let bytes = read_whole_header(reader)?;
        let mut cursor = ByteCursor::new(&bytes);

        let mut header = parse_prologue(&mut cursor, file_name)?;
        let base = apply_charset(&mut cursor, &mut header, charset_override)?;
        let types = read_field_types(&mut cursor, header.field_count)?;
        read_field_descriptors(&mut cursor, &mut header, &types, base)?;
        header.sort_order_id = read_optional_string(&mut cursor, header.charset);
        let name = read_optional_string(&mut cursor, header.charset);

        log::debug!(
            "parsed index header {}: type={} fields={} name={:?}",
            file_name,
            header.file_type,
            header.field_count,
            name
        );
        Ok(Self { header, name })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKeyHeader {
    pub header: DataFileHeader,
    /// 1-based.
    pub index_field_number: u8,
    pub index_root: u16,
    pub index_levels: u8,
}

impl PrimaryKeyHeader {
    pub fn is_valid(&self) -> bool {
        self.header.file_type == FILE_TYPE_PRIMARY_INDEX
    }

    /// Key fields in table order. Names are only known after `bind_names`.
    pub fn fields(&self) -> &[Field] {
        &self.header.fields
    }

    /// `.PX` files carry no field names; the key is the table's leading fields.
    pub fn bind_names(&mut self, table_fields: &[Field]) {
        for (key, table_field) in self.header.fields.iter_mut().zip(table_fields) {
            key.name = table_field.name.clone();
            key.table = table_field.table.clone();
        }
        let keys = match self.header.primary_field_count as usize {
            0 => self.header.fields.len(),
            n => n,
        };
        self.header.fields.truncate(keys.min(table_fields.len()));
    }

    pub fn read<R: Read + Seek>(
        reader: &mut R,
        file_name: &str,
        charset_override: Option<Charset>,
    ) -> Result<Self, DatabaseError> {
        let bytes = read_whole_header(reader)?;
        let mut cursor = ByteCursor::new(&bytes);

        let mut header = parse_prologue(&mut cursor, file_name)?;

        cursor.seek(INDEX_FIELD_NUMBER_OFFSET)?;
        let index_field_number = cursor.read_u8()?;
        cursor.seek(INDEX_ROOT_OFFSET)?;
        let index_root = cursor.read_u16()?;
        let index_levels = cursor.read_u8()?;

        apply_charset(&mut cursor, &mut header, charset_override)?;
        let types = read_field_types(&mut cursor, header.field_count)?;
        let owner = table_stem(file_name);
        header.fields = types
            .iter()
            .enumerate()
            .map(|(i, &(tag, size))| Field::new(i as u16 + 1, tag, size, String::new(), owner.clone()))
            .collect();
        header.field_order = (1..=header.field_count).collect();

        Ok(Self {
            header,
            index_field_number,
            index_root,
            index_levels,
        })
    }
}

/// Reads exactly the declared header in one pass.
fn read_whole_header<R: Read + Seek>(reader: &mut R) -> Result<Vec<u8>, DatabaseError> {
    let prefix = read_chunk(reader, 4)?;
    let mut cursor = ByteCursor::new(&prefix);
    cursor.skip(2)?;
    let header_size = cursor.read_u16()? as usize;
    read_chunk(reader, header_size.max(MIN_HEADER))
}
