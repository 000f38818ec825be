use crate::{
    storage::buffer::ByteCursor,
    types::{BLOCK_PROLOGUE_SIZE, BlockId, error::DatabaseError},
};

/*
 * Table data block (blockSize × 1024 bytes)
 * ┌──────────────────────────────────────────────────────────────┐
 * │ nextBlock(2) | blockNumber(2) | additionalDataSize(2)   (LE) │
 * ├──────────────────────────────────────────────────────────────┤
 * │ row 0 | row 1 | ... | row N-1                           (BE) │
 * │ N = ceil(additionalDataSize / recordSize) + 1                │
 * └──────────────────────────────────────────────────────────────┘
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlock {
    /// 0 terminates the chain.
    pub next_block: BlockId,
    pub block_number: BlockId,
    pub additional_data_size: u16,
}

impl DataBlock {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatabaseError> {
        let mut cursor = ByteCursor::new(bytes);
        let next_block = cursor.read_u16()?;
        let block_number = cursor.read_u16()?;
        let additional_data_size = cursor.read_u16()?;
        Ok(Self {
            next_block,
            block_number,
            additional_data_size,
        })
    }

    /// Well-formed blocks store a multiple of the record size here; a partial
    /// trailing record still counts as a row.
    pub fn rows_in_block(&self, record_size: u16) -> usize {
        (self.additional_data_size as usize).div_ceil(record_size as usize) + 1
    }

    /// Checks that the advertised rows fit inside a block of `block_bytes`.
    pub fn validate_capacity(
        &self,
        block_id: BlockId,
        record_size: u16,
        block_bytes: usize,
    ) -> Result<usize, DatabaseError> {
        let rows = self.rows_in_block(record_size);
        let payload = block_bytes.saturating_sub(BLOCK_PROLOGUE_SIZE);
        if rows * record_size as usize > payload {
            return Err(DatabaseError::CorruptedBlock {
                block: block_id,
                reason: format!(
                    "{} rows of {} bytes exceed block payload of {} bytes",
                    rows, record_size, payload
                ),
            });
        }
        Ok(rows)
    }
}
