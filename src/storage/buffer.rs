//! Bounds-checked little/big-endian cursor over a borrowed byte slice.
//!
//! Paradox stores header and block metadata little-endian but row payloads
//! big-endian, so the cursor carries a switchable byte order instead of
//! hard-coding one. Every read is validated against the slice length and
//! reports a `BufferUnderrun` rather than panicking.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::types::{BlockId, error::DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
    order: Endian,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            order: Endian::Little,
        }
    }

    pub fn with_order(data: &'a [u8], order: Endian) -> Self {
        Self {
            data,
            position: 0,
            order,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn order(&self) -> Endian {
        self.order
    }

    pub fn set_order(&mut self, order: Endian) {
        self.order = order;
    }

    pub fn seek(&mut self, position: usize) -> Result<(), DatabaseError> {
        if position > self.data.len() {
            return Err(DatabaseError::BufferUnderrun {
                position,
                needed: 0,
                available: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<(), DatabaseError> {
        self.take(count).map(|_| ())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DatabaseError> {
        if count > self.remaining() {
            return Err(DatabaseError::BufferUnderrun {
                position: self.position,
                needed: count,
                available: self.remaining(),
            });
        }
        let start = self.position;
        self.position += count;
        Ok(&self.data[start..self.position])
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], DatabaseError> {
        self.take(count)
    }

    pub fn read_u8(&mut self) -> Result<u8, DatabaseError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DatabaseError> {
        let bytes = self.take(2)?;
        Ok(match self.order {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        })
    }

    pub fn read_i16(&mut self) -> Result<i16, DatabaseError> {
        self.read_u16().map(|v| v as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, DatabaseError> {
        let bytes = self.take(4)?;
        Ok(match self.order {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32, DatabaseError> {
        self.read_u32().map(|v| v as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, DatabaseError> {
        let bytes = self.take(8)?;
        Ok(match self.order {
            Endian::Little => LittleEndian::read_u64(bytes),
            Endian::Big => BigEndian::read_u64(bytes),
        })
    }

    /// Reads up to and including the next NUL, returning the bytes before it.
    pub fn read_cstr(&mut self) -> Result<&'a [u8], DatabaseError> {
        let rest = &self.data[self.position..];
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                let value = &rest[..end];
                self.position += end + 1;
                Ok(value)
            }
            None => Err(DatabaseError::BufferUnderrun {
                position: self.position,
                needed: rest.len() + 1,
                available: rest.len(),
            }),
        }
    }

    /// Consumes exactly `width` bytes and returns the prefix before the first NUL.
    pub fn read_fixed_cstr(&mut self, width: usize) -> Result<&'a [u8], DatabaseError> {
        let raw = self.take(width)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(&raw[..end])
    }
}

/// Hook applied to every raw table block before it is decoded.
pub trait BlockDecryptor: Send + Sync {
    fn decrypt(&self, block: &mut [u8], block_number: BlockId, key: u32);
}
