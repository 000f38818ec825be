pub mod block;
pub mod error;
pub mod field;
pub mod row;
pub mod value;

// Common type aliases
pub type BlockId = u16;
pub type RowId = u64;

// Constants following the Paradox on-disk layout
pub const BLOCK_UNIT: usize = 1024; // table block size is stored in KiB
pub const BLOCK_PROLOGUE_SIZE: usize = 6; // next(2) + number(2) + additional data size(2)
pub const INITIAL_HEADER_CHUNK: usize = 2048;
pub const MINIMUM_VERSION: u8 = 4;

pub const BLOB_CHUNK_SIZE: u64 = 4096;
pub const BLOB_POINTER_SIZE: usize = 10; // offset(4) + length(4) + modifier(2)
pub const BLOB_SUB_BLOCK_ENTRIES: usize = 64;
pub const BLOB_SUB_BLOCK_ENTRY_SIZE: usize = 5;
pub const WHOLE_BLOCK_INDEX: u8 = 0xFF;
