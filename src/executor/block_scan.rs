use std::{
    collections::HashSet,
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use crate::{
    executor::scan::Scanner,
    storage::{
        buffer::{BlockDecryptor, ByteCursor, Endian},
        charset::Charset,
        decoder::{decode_value, skip_value},
        header::DataFileHeader,
    },
    types::{
        BLOCK_PROLOGUE_SIZE, BlockId, RowId,
        block::DataBlock,
        error::DatabaseError,
        field::Field,
        row::Row,
        value::Value,
    },
};

/// Full sequential scan over a table's block chain.
///
/// Starts at the header's first block and follows each block's next pointer
/// until it reaches 0. Every row of every block is decoded; fields that were
/// not requested are skipped without decoding.
pub struct BlockScanner {
    file: File,
    header: DataFileHeader,
    /// Every field in file order, paired with whether it is returned.
    plan: Vec<(Field, bool)>,
    decryptor: Option<Box<dyn BlockDecryptor>>,
    buffer: Vec<u8>,
    visited: HashSet<BlockId>,
    started: bool,
    current_block: Option<BlockId>,
    next_block: BlockId,
    rows_in_block: usize,
    row_index: usize,
    next_row_id: RowId,
    is_exhausted: bool,
}

impl BlockScanner {
    /// `requested` selects columns by name (case-insensitive); `None` returns all.
    pub fn new(
        file: File,
        header: DataFileHeader,
        requested: Option<&[&str]>,
    ) -> Result<Self, DatabaseError> {
        if header.record_size == 0 {
            return Err(DatabaseError::invalid_header(
                header.file_name.clone(),
                "record size is zero",
            ));
        }
        let plan = build_plan(&header, requested)?;
        let block_bytes = header.block_size_bytes();
        Ok(Self {
            file,
            header,
            plan,
            decryptor: None,
            buffer: vec![0u8; block_bytes],
            visited: HashSet::new(),
            started: false,
            current_block: None,
            next_block: 0,
            rows_in_block: 0,
            row_index: 0,
            next_row_id: 1,
            is_exhausted: false,
        })
    }

    /// Opens the table file at `path` and parses its header.
    pub fn open<P: AsRef<Path>>(
        path: P,
        charset_override: Option<Charset>,
        requested: Option<&[&str]>,
    ) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let name = path.to_string_lossy();
        let header = DataFileHeader::read_table(&mut file, &name, charset_override)?;
        Self::new(file, header, requested)
    }

    pub fn with_decryptor(mut self, decryptor: Box<dyn BlockDecryptor>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    pub fn header(&self) -> &DataFileHeader {
        &self.header
    }

    /// Columns present in each returned row, in file order.
    pub fn fields(&self) -> Vec<&Field> {
        self.plan
            .iter()
            .filter(|(_, keep)| *keep)
            .map(|(field, _)| field)
            .collect()
    }

    pub fn blocks_visited(&self) -> usize {
        self.visited.len()
    }

    fn load_block(&mut self, block_id: BlockId) -> Result<(), DatabaseError> {
        if !self.visited.insert(block_id) {
            return Err(DatabaseError::CorruptedBlock {
                block: block_id,
                reason: "block chain revisits a block".to_string(),
            });
        }
        let limit = self.header.total_blocks.max(self.header.used_blocks) as usize;
        if self.visited.len() > limit {
            return Err(DatabaseError::CorruptedBlock {
                block: block_id,
                reason: format!("block chain is longer than the {limit} blocks in the file"),
            });
        }

        let offset = self.header.block_offset(block_id);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut self.buffer)?;

        if self.header.is_encrypted() {
            let Some(decryptor) = self.decryptor.as_ref() else {
                return Err(DatabaseError::EncryptedTable {
                    table: self.header.file_name.clone(),
                });
            };
            decryptor.decrypt(&mut self.buffer, block_id, self.header.encryption);
        }

        let block = DataBlock::from_bytes(&self.buffer)?;
        let rows = block.validate_capacity(block_id, self.header.record_size, self.buffer.len())?;
        log::debug!(
            "{}: block {} at offset {}, {} rows, next {}",
            self.header.file_name,
            block_id,
            offset,
            rows,
            block.next_block
        );

        self.current_block = Some(block_id);
        self.next_block = block.next_block;
        self.rows_in_block = rows;
        self.row_index = 0;
        Ok(())
    }

    fn read_row(&mut self) -> Result<Row, DatabaseError> {
        let record_size = self.header.record_size as usize;
        let start = BLOCK_PROLOGUE_SIZE + self.row_index * record_size;
        let record = &self.buffer[start..start + record_size];
        let values = decode_row(record, &self.plan, self.header.charset)?;

        let row = Row::with_row_id(self.next_row_id, values);
        self.row_index += 1;
        self.next_row_id += 1;
        Ok(row)
    }
}

fn build_plan(
    header: &DataFileHeader,
    requested: Option<&[&str]>,
) -> Result<Vec<(Field, bool)>, DatabaseError> {
    if let Some(names) = requested {
        for name in names {
            if header.field(name).is_none() {
                return Err(DatabaseError::ColumnNotFound {
                    name: name.to_string(),
                    table: header.file_name.clone(),
                });
            }
        }
    }

    let mut plan = Vec::with_capacity(header.fields.len());
    for field in &header.fields {
        let keep = requested.is_none_or(|names| names.iter().any(|n| field.is_named(n)));
        if keep {
            field.require_type()?;
        }
        plan.push((field.clone(), keep));
    }
    Ok(plan)
}

/// Decodes one big-endian record, skipping fields that are not kept.
fn decode_row(
    record: &[u8],
    plan: &[(Field, bool)],
    charset: Charset,
) -> Result<Vec<Value>, DatabaseError> {
    let mut cursor = ByteCursor::with_order(record, Endian::Big);
    let mut values = Vec::with_capacity(plan.len());
    for (field, keep) in plan {
        if *keep {
            values.push(decode_value(&mut cursor, field, charset)?);
        } else {
            skip_value(&mut cursor, field)?;
        }
    }
    Ok(values)
}

impl Scanner for BlockScanner {
    fn scan(&mut self) -> Result<Option<Row>, DatabaseError> {
        loop {
            if self.is_exhausted {
                return Ok(None);
            }
            if self.current_block.is_some() && self.row_index < self.rows_in_block {
                return self.read_row().map(Some);
            }

            let next = if self.started {
                self.next_block
            } else {
                self.started = true;
                if self.header.used_blocks == 0 {
                    0
                } else {
                    self.header.first_block
                }
            };
            if next == 0 {
                self.is_exhausted = true;
                return Ok(None);
            }
            self.load_block(next)?;
        }
    }

    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<Row>, DatabaseError> {
        let mut rows = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            match self.scan()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    fn reset(&mut self) -> Result<(), DatabaseError> {
        self.visited.clear();
        self.started = false;
        self.current_block = None;
        self.next_block = 0;
        self.rows_in_block = 0;
        self.row_index = 0;
        self.next_row_id = 1;
        self.is_exhausted = false;
        Ok(())
    }
}
