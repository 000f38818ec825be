//! Memo/blob companion file (`.MB`) resolution.
//!
//! ## File Format
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Header block (4096 bytes): byte 0 must be 0                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Block: kind(1) chunks(2, LE) ...        size = chunks × 4096     │
//! │   kind 2 (single):  length(4) modifier(2) payload                │
//! │   kind 3 (sub):     9 unknown bytes, 64 × [off(1) len(1) rsv(2)  │
//! │                     mod(1)]; data at blockStart + off × 16       │
//! │   kind 4 (free):    no payload                                   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Blocks are discovered by a forward scan and every block seen is cached,
//! so a session amortizes to one pass over the file.

use std::{
    collections::HashMap,
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::{
    storage::{charset::Charset, files::find_companion},
    types::{
        BLOB_CHUNK_SIZE, BLOB_SUB_BLOCK_ENTRIES, BLOB_SUB_BLOCK_ENTRY_SIZE, WHOLE_BLOCK_INDEX,
        error::DatabaseError, value::LobValue,
    },
};

pub const DEFAULT_BLOB_EXTENSION: &str = "mb";

const SUB_BLOCK_SKIP: i64 = 9;
/// kind(1) chunks(2) length(4) modifier(2)
const SINGLE_BLOCK_HEADER: u64 = 9;

/// Packed 32-bit pointer from a row into the blob file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobReference(u32);

impl BlobReference {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    /// 0xFF addresses a whole single block; anything else is a sub-block slot.
    pub fn sub_index(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    // Reproduces the existing readers' nibble arithmetic (×15, not ×16).
    // Files written past block 15 rely on this exact mapping.
    pub fn block_number(&self) -> u32 {
        let idx = (self.0 >> 8) & 0xFF;
        (idx & 0x0F) * 0xF + ((idx & 0xF0) >> 4)
    }

    pub fn file_offset(&self) -> u64 {
        (self.0 & 0xFFFF_FF00) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobBlockKind {
    Single = 2,
    SubBlock = 3,
    Free = 4,
}

impl BlobBlockKind {
    pub fn from_u8(value: u8, offset: u64) -> Result<Self, DatabaseError> {
        match value {
            2 => Ok(BlobBlockKind::Single),
            3 => Ok(BlobBlockKind::SubBlock),
            4 => Ok(BlobBlockKind::Free),
            kind => Err(DatabaseError::InvalidBlobBlockType { kind, offset }),
        }
    }
}

/// A decoded chunk of the blob file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClobBlock {
    pub block_number: u32,
    pub kind: BlobBlockKind,
    pub sub_index: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobStats {
    pub blocks_read: u64,
    pub seeks: u64,
    pub cache_hits: u64,
}

struct OpenBlobFile {
    path: PathBuf,
    file: File,
    len: u64,
}

/// Lazily-opened view of a table's blob file with a per-session decode cache.
pub struct BlobSession {
    table_path: PathBuf,
    extension: String,
    file: Option<OpenBlobFile>,
    position: u64,
    block_counter: u32,
    cache: HashMap<(u32, u8), ClobBlock>,
    stats: BlobStats,
}

impl BlobSession {
    /// Binds a session to a table; the blob file is located and opened on first use.
    pub fn new<P: AsRef<Path>>(table_path: P) -> Self {
        Self::with_extension(table_path, DEFAULT_BLOB_EXTENSION)
    }

    pub fn with_extension<P: AsRef<Path>>(table_path: P, extension: &str) -> Self {
        Self {
            table_path: table_path.as_ref().to_path_buf(),
            extension: extension.to_string(),
            file: None,
            position: BLOB_CHUNK_SIZE,
            block_counter: 0,
            cache: HashMap::new(),
            stats: BlobStats::default(),
        }
    }

    pub fn stats(&self) -> BlobStats {
        self.stats
    }

    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    pub fn blob_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    /// Drops every cached block and restarts discovery from the first data block.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.position = BLOB_CHUNK_SIZE;
        self.block_counter = 0;
    }

    fn ensure_open(&mut self) -> Result<(), DatabaseError> {
        if self.file.is_some() {
            return Ok(());
        }
        let path = find_companion(&self.table_path, &self.extension)?;
        let mut file = File::open(&path)?;
        let len = file.metadata()?.len();

        let mut first = [0u8; 1];
        if file.read(&mut first)? != 1 || first[0] != 0 {
            return Err(DatabaseError::InvalidBlobHeader { path });
        }
        log::debug!("opened blob file {} ({} bytes)", path.display(), len);

        self.position = BLOB_CHUNK_SIZE;
        self.file = Some(OpenBlobFile { path, file, len });
        Ok(())
    }

    /// Returns the bytes addressed by `reference`, scanning forward as needed.
    pub fn resolve(&mut self, reference: BlobReference) -> Result<Vec<u8>, DatabaseError> {
        self.ensure_open()?;
        let key = (reference.block_number(), reference.sub_index());

        if let Some(block) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            return Self::payload(block, reference, &self.table_path);
        }

        while self.read_next_block()? {
            if let Some(block) = self.cache.get(&key) {
                return Self::payload(block, reference, &self.table_path);
            }
        }

        let path = self
            .blob_path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.table_path.clone());
        Err(DatabaseError::BlobNotFound {
            reference: reference.raw(),
            path,
        })
    }

    fn payload(
        block: &ClobBlock,
        reference: BlobReference,
        table_path: &Path,
    ) -> Result<Vec<u8>, DatabaseError> {
        if block.kind == BlobBlockKind::Free {
            return Err(DatabaseError::BlobNotFound {
                reference: reference.raw(),
                path: table_path.to_path_buf(),
            });
        }
        Ok(block.data.clone())
    }

    /// Resolves a row's lob value, using the inline leader when it holds everything.
    pub fn resolve_lob(&mut self, lob: &LobValue) -> Result<Vec<u8>, DatabaseError> {
        if let Some(bytes) = lob.inline_bytes() {
            return Ok(bytes.to_vec());
        }
        let Some(reference) = lob.reference else {
            return Ok(Vec::new());
        };
        let mut data = self.resolve(reference)?;
        data.truncate(lob.length as usize);
        Ok(data)
    }

    pub fn resolve_text(&mut self, lob: &LobValue, charset: Charset) -> Result<String, DatabaseError> {
        let bytes = self.resolve_lob(lob)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(charset.decode(&bytes[..end]))
    }

    /// Reads one block at the scan position and caches everything in it.
    /// Returns `false` once the end of the file is reached.
    fn read_next_block(&mut self) -> Result<bool, DatabaseError> {
        let Some(open) = self.file.as_mut() else {
            return Ok(false);
        };
        if self.position + 3 > open.len {
            return Ok(false);
        }

        let block_start = self.position;
        open.file.seek(SeekFrom::Start(block_start))?;
        self.stats.seeks += 1;
        let kind = BlobBlockKind::from_u8(open.file.read_u8()?, block_start)?;
        let chunks = open.file.read_u16::<LittleEndian>()?;
        if chunks == 0 {
            return Err(DatabaseError::CorruptedBlock {
                block: (block_start / BLOB_CHUNK_SIZE) as u16,
                reason: "blob block spans zero chunks".to_string(),
            });
        }

        self.block_counter += 1;
        let number = self.block_counter;
        self.stats.blocks_read += 1;

        match kind {
            BlobBlockKind::Free => {
                self.cache.insert(
                    (number, WHOLE_BLOCK_INDEX),
                    ClobBlock {
                        block_number: number,
                        kind,
                        sub_index: WHOLE_BLOCK_INDEX,
                        data: Vec::new(),
                    },
                );
                self.position = block_start + chunks as u64 * BLOB_CHUNK_SIZE;
            }
            BlobBlockKind::Single => {
                let length = open.file.read_u32::<LittleEndian>()? as u64;
                let _modifier = open.file.read_u16::<LittleEndian>()?;
                let capacity = chunks as u64 * BLOB_CHUNK_SIZE - SINGLE_BLOCK_HEADER;
                if length > capacity {
                    return Err(DatabaseError::CorruptedBlock {
                        block: (block_start / BLOB_CHUNK_SIZE) as u16,
                        reason: format!(
                            "blob of {length} bytes overruns its {chunks}-chunk block"
                        ),
                    });
                }
                let mut data = vec![0u8; length as usize];
                open.file.read_exact(&mut data)?;
                self.cache.insert(
                    (number, WHOLE_BLOCK_INDEX),
                    ClobBlock {
                        block_number: number,
                        kind,
                        sub_index: WHOLE_BLOCK_INDEX,
                        data,
                    },
                );
                self.position = block_start + chunks as u64 * BLOB_CHUNK_SIZE;
            }
            BlobBlockKind::SubBlock => {
                open.file.seek(SeekFrom::Current(SUB_BLOCK_SKIP))?;
                let mut table = [0u8; BLOB_SUB_BLOCK_ENTRIES * BLOB_SUB_BLOCK_ENTRY_SIZE];
                open.file.read_exact(&mut table)?;

                for (slot, entry) in table.chunks_exact(BLOB_SUB_BLOCK_ENTRY_SIZE).enumerate() {
                    let offset = entry[0] as u64 * 16;
                    if offset == 0 {
                        // deleted or reused slot
                        continue;
                    }
                    let rounded = entry[1] as usize * 16;
                    let modulo = entry[4] as usize;
                    let length = (rounded + modulo).saturating_sub(16);
                    if offset + length as u64 > BLOB_CHUNK_SIZE {
                        return Err(DatabaseError::CorruptedBlock {
                            block: (block_start / BLOB_CHUNK_SIZE) as u16,
                            reason: format!(
                                "sub-block entry {slot} ({length} bytes at {offset}) overruns its block"
                            ),
                        });
                    }

                    open.file.seek(SeekFrom::Start(block_start + offset))?;
                    self.stats.seeks += 1;
                    let mut data = vec![0u8; length];
                    open.file.read_exact(&mut data)?;

                    let sub_index = slot as u8;
                    self.cache.insert(
                        (number, sub_index),
                        ClobBlock {
                            block_number: number,
                            kind,
                            sub_index,
                            data,
                        },
                    );
                }
                self.position = block_start + BLOB_CHUNK_SIZE;
            }
        }

        log::debug!(
            "blob block #{} ({:?}) at offset {}, {} cached",
            number,
            kind,
            block_start,
            self.cache.len()
        );
        Ok(true)
    }
}
