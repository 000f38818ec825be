use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    storage::{
        blob::DEFAULT_BLOB_EXTENSION, charset::Charset,
        validation::DEFAULT_VALIDATION_EXTENSION,
    },
    types::error::DatabaseError,
};

pub const DEFAULT_PRIMARY_KEY_EXTENSION: &str = "px";
pub const DEFAULT_VIEW_CHARSET: &str = "windows-1252";

/// Reader settings, usually loaded from a TOML file:
///
/// ```toml
/// charset = "cp850"
/// blob_extension = "mb"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Overrides the code page stored in every header.
    pub charset: Option<String>,
    pub blob_extension: String,
    pub validation_extension: String,
    pub primary_key_extension: String,
    pub view_charset: String,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            charset: None,
            blob_extension: DEFAULT_BLOB_EXTENSION.to_string(),
            validation_extension: DEFAULT_VALIDATION_EXTENSION.to_string(),
            primary_key_extension: DEFAULT_PRIMARY_KEY_EXTENSION.to_string(),
            view_charset: DEFAULT_VIEW_CHARSET.to_string(),
        }
    }
}

impl ReadOptions {
    pub fn from_toml_str(text: &str) -> Result<Self, DatabaseError> {
        toml::from_str(text).map_err(|e| DatabaseError::Config {
            details: e.to_string(),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_charset(mut self, label: &str) -> Self {
        self.charset = Some(label.to_string());
        self
    }

    pub fn charset_override(&self) -> Result<Option<Charset>, DatabaseError> {
        self.charset.as_deref().map(Charset::for_label).transpose()
    }

    pub fn view_charset(&self) -> Result<Charset, DatabaseError> {
        Charset::for_label(&self.view_charset)
    }
}
