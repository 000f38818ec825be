//! Builders that synthesize table, blob, index and validation files for
//! tests and benchmarks.

use std::{
    fs,
    path::{Path, PathBuf},
};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tempfile::TempDir;

use crate::{
    storage::{blob::BlobReference, header::FILE_TYPE_TABLE},
    types::{
        BLOB_CHUNK_SIZE, BLOB_POINTER_SIZE, BLOB_SUB_BLOCK_ENTRIES, BLOCK_PROLOGUE_SIZE,
        BLOCK_UNIT, INITIAL_HEADER_CHUNK, MINIMUM_VERSION, error::DatabaseError,
    },
};

/// Scratch directory removed on drop.
pub struct TempDirectory {
    dir: TempDir,
}

impl TempDirectory {
    pub fn new() -> Result<Self, DatabaseError> {
        Ok(Self {
            dir: tempfile::Builder::new().prefix("pxread_").tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, DatabaseError> {
        let path = self.dir.path().join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

// Row payload encoders (big-endian, sign-flipped like the files themselves).

pub fn encode_alpha(text: &str, size: usize) -> Vec<u8> {
    let mut raw = text.as_bytes().to_vec();
    raw.resize(size, 0);
    raw
}

pub fn encode_short(value: i16) -> Vec<u8> {
    ((value as u16) ^ 0x8000).to_be_bytes().to_vec()
}

pub fn encode_long(value: i32) -> Vec<u8> {
    ((value as u32) ^ 0x8000_0000).to_be_bytes().to_vec()
}

pub fn encode_number(value: f64) -> Vec<u8> {
    let bits = value.to_bits();
    let stored = if value.is_sign_negative() {
        !bits
    } else {
        bits | (1 << 63)
    };
    stored.to_be_bytes().to_vec()
}

pub fn encode_logical(value: bool) -> Vec<u8> {
    vec![if value { 0x81 } else { 0x80 }]
}

pub fn encode_date(date: NaiveDate) -> Vec<u8> {
    ((date.num_days_from_ce() as u32) ^ 0x8000_0000)
        .to_be_bytes()
        .to_vec()
}

fn millis_of_day(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() * 1000 + time.nanosecond() / 1_000_000
}

pub fn encode_time(time: NaiveTime) -> Vec<u8> {
    (millis_of_day(time) ^ 0x8000_0000).to_be_bytes().to_vec()
}

pub fn encode_timestamp(timestamp: NaiveDateTime) -> Vec<u8> {
    let days = timestamp.date().num_days_from_ce() as f64;
    encode_number(days * 86_400_000.0 + millis_of_day(timestamp.time()) as f64)
}

pub fn encode_null(size: usize) -> Vec<u8> {
    vec![0u8; size]
}

fn lob_slot(leader: &[u8], offset: u32, length: u32, size: usize) -> Vec<u8> {
    let mut raw = leader.to_vec();
    raw.resize(size - BLOB_POINTER_SIZE, 0);
    raw.extend_from_slice(&offset.to_le_bytes());
    raw.extend_from_slice(&length.to_le_bytes());
    raw.extend_from_slice(&0u16.to_le_bytes());
    raw
}

/// A memo/blob slot whose data fits in the leader.
pub fn encode_lob_inline(data: &[u8], size: usize) -> Vec<u8> {
    lob_slot(data, 0, data.len() as u32, size)
}

/// A memo/blob slot pointing into the blob file.
pub fn encode_lob_reference(
    leader: &[u8],
    reference: BlobReference,
    length: u32,
    size: usize,
) -> Vec<u8> {
    let leader = &leader[..leader.len().min(size - BLOB_POINTER_SIZE)];
    lob_slot(leader, reference.raw(), length, size)
}

/// Concatenates encoded field values into one record.
pub fn record(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

struct BlockSpec {
    next: Option<u16>,
    additional: Option<u16>,
    rows: Vec<Vec<u8>>,
}

/// Builds a table (`.DB`), primary key (`.PX`) or index (`.Xnn`) file.
pub struct TableFileBuilder {
    file_name: String,
    table_name: String,
    file_type: u8,
    version: u8,
    code_page: u16,
    block_size: u8,
    fields: Vec<(String, u8, u8)>,
    blocks: Vec<BlockSpec>,
    first_block: Option<u16>,
    used_blocks: Option<u16>,
    row_count: Option<u32>,
    primary_field_count: u16,
    encryption: u32,
    auto_increment: u32,
    index_field_number: u8,
    index_root: u16,
    index_levels: u8,
    sort_order: Option<String>,
    index_name: Option<String>,
}

impl TableFileBuilder {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            table_name: file_name.to_string(),
            file_type: FILE_TYPE_TABLE,
            version: 0x0B,
            code_page: 1252,
            block_size: 1,
            fields: Vec::new(),
            blocks: Vec::new(),
            first_block: None,
            used_blocks: None,
            row_count: None,
            primary_field_count: 0,
            encryption: 0,
            auto_increment: 0,
            index_field_number: 0,
            index_root: 0,
            index_levels: 0,
            sort_order: None,
            index_name: None,
        }
    }

    pub fn file_type(mut self, file_type: u8) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn code_page(mut self, code_page: u16) -> Self {
        self.code_page = code_page;
        self
    }

    /// Block size in KiB.
    pub fn block_size(mut self, kib: u8) -> Self {
        self.block_size = kib;
        self
    }

    /// Adds a field with its on-disk size (lob types include the 10 pointer bytes).
    pub fn field(mut self, name: &str, type_tag: u8, size: u8) -> Self {
        self.fields.push((name.to_string(), type_tag, size));
        self
    }

    /// Appends a block linked to the following one.
    pub fn block(mut self, rows: Vec<Vec<u8>>) -> Self {
        self.blocks.push(BlockSpec {
            next: None,
            additional: None,
            rows,
        });
        self
    }

    /// Appends a block with an explicit next pointer and additional-data size.
    pub fn raw_block(mut self, next: u16, additional: u16, rows: Vec<Vec<u8>>) -> Self {
        self.blocks.push(BlockSpec {
            next: Some(next),
            additional: Some(additional),
            rows,
        });
        self
    }

    pub fn first_block(mut self, block: u16) -> Self {
        self.first_block = Some(block);
        self
    }

    pub fn used_blocks(mut self, count: u16) -> Self {
        self.used_blocks = Some(count);
        self
    }

    pub fn row_count(mut self, count: u32) -> Self {
        self.row_count = Some(count);
        self
    }

    pub fn primary_field_count(mut self, count: u16) -> Self {
        self.primary_field_count = count;
        self
    }

    pub fn encryption(mut self, word: u32) -> Self {
        self.encryption = word;
        self
    }

    pub fn auto_increment(mut self, value: u32) -> Self {
        self.auto_increment = value;
        self
    }

    pub fn index_root(mut self, field_number: u8, root: u16, levels: u8) -> Self {
        self.index_field_number = field_number;
        self.index_root = root;
        self.index_levels = levels;
        self
    }

    pub fn sort_order(mut self, id: &str) -> Self {
        self.sort_order = Some(id.to_string());
        self
    }

    pub fn index_name(mut self, name: &str) -> Self {
        self.index_name = Some(name.to_string());
        self
    }

    pub fn record_size(&self) -> u16 {
        self.fields.iter().map(|(_, _, size)| *size as u16).sum()
    }

    fn descriptor_area(&self) -> Vec<u8> {
        let width = if self.version == 0x0C { 261 } else { 79 };
        let mut area = Vec::new();
        for (_, tag, size) in &self.fields {
            area.push(*tag);
            area.push(*size);
        }
        // table name pointer plus one pointer per field
        area.resize(area.len() + 4 + 4 * self.fields.len(), 0);

        let mut name = self.table_name.as_bytes().to_vec();
        name.resize(width, 0);
        area.extend_from_slice(&name);

        for (field_name, _, _) in &self.fields {
            area.extend_from_slice(field_name.as_bytes());
            area.push(0);
        }
        for order in 1..=self.fields.len() as u16 {
            area.extend_from_slice(&order.to_le_bytes());
        }
        for text in [&self.sort_order, &self.index_name].into_iter().flatten() {
            area.extend_from_slice(text.as_bytes());
            area.push(0);
        }
        area
    }

    pub fn build(&self) -> Vec<u8> {
        let base = if self.version > MINIMUM_VERSION { 0x78 } else { 0x58 };
        let area = self.descriptor_area();
        let header_size = (base + area.len()).div_ceil(INITIAL_HEADER_CHUNK) * INITIAL_HEADER_CHUNK;
        let block_bytes = self.block_size as usize * BLOCK_UNIT;
        let record_size = self.record_size();
        let block_count = self.blocks.len() as u16;
        let rows: usize = self.blocks.iter().map(|b| b.rows.len()).sum();

        let mut header = vec![0u8; header_size];
        LittleEndian::write_u16(&mut header[0x00..], record_size);
        LittleEndian::write_u16(&mut header[0x02..], header_size as u16);
        header[0x04] = self.file_type;
        header[0x05] = self.block_size;
        LittleEndian::write_u32(&mut header[0x06..], self.row_count.unwrap_or(rows as u32));
        LittleEndian::write_u16(&mut header[0x0A..], self.used_blocks.unwrap_or(block_count));
        LittleEndian::write_u16(&mut header[0x0C..], block_count);
        LittleEndian::write_u16(
            &mut header[0x0E..],
            self.first_block.unwrap_or(if block_count > 0 { 1 } else { 0 }),
        );
        LittleEndian::write_u16(&mut header[0x10..], block_count);
        header[0x15] = self.index_field_number;
        LittleEndian::write_u16(&mut header[0x1E..], self.index_root);
        header[0x20] = self.index_levels;
        LittleEndian::write_u16(&mut header[0x21..], self.fields.len() as u16);
        LittleEndian::write_u16(&mut header[0x23..], self.primary_field_count);
        LittleEndian::write_u32(&mut header[0x25..], self.encryption);
        header[0x39] = self.version;
        LittleEndian::write_u32(&mut header[0x49..], self.auto_increment);
        if self.version > MINIMUM_VERSION {
            LittleEndian::write_u16(&mut header[0x6A..], self.code_page);
        }
        header[base..base + area.len()].copy_from_slice(&area);

        let mut file = header;
        for (i, spec) in self.blocks.iter().enumerate() {
            let next = spec.next.unwrap_or(if i + 1 < self.blocks.len() {
                i as u16 + 2
            } else {
                0
            });
            let additional = spec
                .additional
                .unwrap_or((spec.rows.len().saturating_sub(1) * record_size as usize) as u16);

            let mut block = Vec::with_capacity(block_bytes);
            block.extend_from_slice(&next.to_le_bytes());
            block.extend_from_slice(&(i as u16 + 1).to_le_bytes());
            block.extend_from_slice(&additional.to_le_bytes());
            debug_assert_eq!(block.len(), BLOCK_PROLOGUE_SIZE);
            for row in &spec.rows {
                block.extend_from_slice(row);
            }
            block.resize(block_bytes, 0);
            file.extend_from_slice(&block);
        }
        file
    }

    pub fn write_to(&self, dir: &TempDirectory) -> Result<PathBuf, DatabaseError> {
        dir.write(&self.file_name, &self.build())
    }
}

/// Builds a blob (`.MB`) file block by block, handing back references.
pub struct BlobFileBuilder {
    data: Vec<u8>,
}

impl Default for BlobFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobFileBuilder {
    pub fn new() -> Self {
        Self {
            data: vec![0u8; BLOB_CHUNK_SIZE as usize],
        }
    }

    /// Corrupts the leading header byte.
    pub fn invalid_header(mut self) -> Self {
        self.data[0] = 1;
        self
    }

    fn block_start(&self) -> usize {
        self.data.len()
    }

    /// Appends a kind-2 block holding one value.
    pub fn single(&mut self, payload: &[u8]) -> BlobReference {
        let start = self.block_start();
        let chunk = BLOB_CHUNK_SIZE as usize;
        let chunks = (9 + payload.len()).div_ceil(chunk);
        let mut block = Vec::with_capacity(chunks * chunk);
        let _ = block.write_u8(2);
        let _ = block.write_u16::<LittleEndian>(chunks as u16);
        let _ = block.write_u32::<LittleEndian>(payload.len() as u32);
        let _ = block.write_u16::<LittleEndian>(0);
        block.extend_from_slice(payload);
        block.resize(chunks * chunk, 0);
        self.data.extend_from_slice(&block);
        BlobReference::new(start as u32 | 0xFF)
    }

    /// Appends a kind-3 block. `None` slots are written as deleted entries.
    pub fn sub_block(&mut self, slots: &[Option<&[u8]>]) -> Vec<Option<BlobReference>> {
        let start = self.block_start();
        let chunk = BLOB_CHUNK_SIZE as usize;
        let mut block = vec![0u8; chunk];
        block[0] = 3;
        LittleEndian::write_u16(&mut block[1..], 1);

        let table_start = 3 + 9;
        let mut data_offset = (table_start + BLOB_SUB_BLOCK_ENTRIES * 5).div_ceil(16) * 16;
        let mut references = Vec::with_capacity(slots.len());
        for (slot, payload) in slots.iter().take(BLOB_SUB_BLOCK_ENTRIES).enumerate() {
            let Some(payload) = payload else {
                references.push(None);
                continue;
            };
            let entry = table_start + slot * 5;
            block[entry] = (data_offset / 16) as u8;
            block[entry + 1] = (payload.len() / 16 + 1) as u8;
            block[entry + 4] = (payload.len() % 16) as u8;
            block[data_offset..data_offset + payload.len()].copy_from_slice(payload);
            data_offset += payload.len().div_ceil(16).max(1) * 16;
            references.push(Some(BlobReference::new(start as u32 | slot as u32)));
        }

        self.data.extend_from_slice(&block);
        references
    }

    /// Appends a kind-4 block spanning `chunks` × 4096 bytes.
    pub fn free(&mut self, chunks: u16) {
        let mut block = vec![0u8; chunks as usize * BLOB_CHUNK_SIZE as usize];
        block[0] = 4;
        LittleEndian::write_u16(&mut block[1..], chunks);
        self.data.extend_from_slice(&block);
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn write_to(&self, dir: &TempDirectory, name: &str) -> Result<PathBuf, DatabaseError> {
        dir.write(name, &self.data)
    }
}

/// One constraint entry; values are already encoded big-endian for the field's type.
#[derive(Debug, Clone, Default)]
pub struct ValidationEntrySpec {
    /// 0-based index into the footer's field list.
    pub field_index: u8,
    pub minimum: Option<Vec<u8>>,
    pub maximum: Option<Vec<u8>>,
    pub default: Option<Vec<u8>>,
    pub mask: Option<String>,
}

/// Builds a validation (`.VAL`) file.
pub struct ValidationFileBuilder {
    version: u8,
    table_name: String,
    fields: Vec<(String, u8, u8)>,
    entries: Vec<ValidationEntrySpec>,
}

impl ValidationFileBuilder {
    pub fn new(table_name: &str) -> Self {
        Self {
            version: 0x09,
            table_name: table_name.to_string(),
            fields: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, type_tag: u8, size: u8) -> Self {
        self.fields.push((name.to_string(), type_tag, size));
        self
    }

    pub fn entry(mut self, entry: ValidationEntrySpec) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = vec![0u8; 0x35];
        data[0x01] = self.version;
        LittleEndian::write_u16(&mut data[0x02..], self.entries.len() as u16);

        for entry in &self.entries {
            let start = data.len();
            let mask = entry.mask.as_ref().map(|m| {
                let mut raw = m.as_bytes().to_vec();
                raw.push(0);
                raw
            });
            let mask_size = mask.as_ref().map_or(0, |m| m.len() as u8 & 0x0F);

            data.resize(start + 0x0C, 0);
            data[start] = entry.field_index;
            data[start + 1] = mask_size;
            for present in [
                entry.minimum.is_some(),
                entry.maximum.is_some(),
                entry.default.is_some(),
                mask.is_some(),
            ] {
                data.extend_from_slice(&u32::from(present).to_le_bytes());
            }
            for value in [&entry.minimum, &entry.maximum, &entry.default].into_iter().flatten() {
                data.extend_from_slice(value);
            }
            if let Some(mask) = &mask {
                data.extend_from_slice(mask);
            }
        }

        let footer = data.len() as u32;
        LittleEndian::write_u32(&mut data[0x09..], footer);
        data.extend_from_slice(&(self.fields.len() as u16).to_le_bytes());
        data.extend_from_slice(&[0u8; 4]);
        for order in 1..=self.fields.len() as u16 {
            data.extend_from_slice(&order.to_le_bytes());
        }
        for (_, tag, size) in &self.fields {
            data.push(*tag);
            data.push(*size);
        }
        let mut name = self.table_name.as_bytes().to_vec();
        name.resize(0x4F, 0);
        data.extend_from_slice(&name);
        for (field_name, _, _) in &self.fields {
            data.extend_from_slice(field_name.as_bytes());
            data.push(0);
        }
        data
    }

    pub fn write_to(&self, dir: &TempDirectory, name: &str) -> Result<PathBuf, DatabaseError> {
        dir.write(name, &self.build())
    }
}
