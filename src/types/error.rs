use std::{fmt, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header in {file}: {reason}")]
    InvalidHeader { file: String, reason: String },

    #[error("Buffer underrun at position {position}: needed {needed} bytes, {available} available")]
    BufferUnderrun {
        position: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unsupported field type 0x{tag:02X} for field '{field}'")]
    UnsupportedFieldType { tag: u8, field: String },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Corrupted block: block={block}, reason={reason}")]
    CorruptedBlock { block: u16, reason: String },

    #[error("Table '{table}' is encrypted and no decryptor was supplied")]
    EncryptedTable { table: String },

    #[error("Invalid blob header in {path}")]
    InvalidBlobHeader { path: PathBuf },

    #[error("Invalid blob block type {kind} at offset {offset}")]
    InvalidBlobBlockType { kind: u8, offset: u64 },

    #[error("Blob reference 0x{reference:08X} not found in {path}")]
    BlobNotFound { reference: u32, path: PathBuf },

    #[error("Companion file '*.{extension}' for {path} not found")]
    CompanionNotFound { path: PathBuf, extension: String },

    #[error("Companion file '*.{extension}' for {path} is ambiguous: {candidates:?}")]
    CompanionAmbiguous {
        path: PathBuf,
        extension: String,
        candidates: Vec<PathBuf>,
    },

    #[error("Column index {index} is out of range for a row of {len} values")]
    ColumnIndexOutOfRange { index: usize, len: usize },

    #[error("Column '{name}' not found in table '{table}'")]
    ColumnNotFound { name: String, table: String },

    #[error("Invalid configuration: {details}")]
    Config { details: String },
}

impl DatabaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::Io(_) => ErrorKind::Io,
            DatabaseError::CompanionNotFound { .. }
            | DatabaseError::CompanionAmbiguous { .. }
            | DatabaseError::ColumnNotFound { .. } => ErrorKind::Lookup,
            DatabaseError::Config { .. } => ErrorKind::Config,
            _ => ErrorKind::Format,
        }
    }

    pub fn invalid_header(file: impl Into<String>, reason: impl Into<String>) -> Self {
        DatabaseError::InvalidHeader {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

/// Coarse classification used by callers deciding whether to abort or degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Io,
    Lookup,
    Config,
}

/// Non-fatal diagnostic recorded while loading auxiliary metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnknownCharset { code_page: u16 },
    Validation { file: String, reason: String },
    Index { file: String, reason: String },
    UnresolvedViewField { table: String, field: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnknownCharset { code_page } => {
                write!(f, "unknown code page {code_page}, falling back to cp437")
            }
            Warning::Validation { file, reason } => {
                write!(f, "ignoring validation file {file}: {reason}")
            }
            Warning::Index { file, reason } => write!(f, "ignoring index file {file}: {reason}"),
            Warning::UnresolvedViewField { table, field } => {
                write!(f, "view field {table}->\"{field}\" not found")
            }
        }
    }
}

/// A value plus the warnings collected while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct WithWarnings<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> WithWarnings<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(value: T, warning: Warning) -> Self {
        log::warn!("{warning}");
        Self {
            value,
            warnings: vec![warning],
        }
    }

    pub fn push(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WithWarnings<U> {
        WithWarnings {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
