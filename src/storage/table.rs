use std::{
    fs::File,
    path::{Path, PathBuf},
};

use crate::{
    config::ReadOptions,
    executor::block_scan::BlockScanner,
    storage::{
        blob::BlobSession,
        charset::Charset,
        files::{companions_matching, find_optional_companion, is_secondary_index_extension},
        header::DataFileHeader,
        index::{IndexHeader, PrimaryKeyHeader},
        validation::{ValidationData, read_validation},
    },
    types::{
        error::{DatabaseError, Warning, WithWarnings},
        field::Field,
    },
};

/// A `.DB` table and the lazily-loaded companion files that share its base name.
#[derive(Debug, Clone)]
pub struct ParadoxTable {
    path: PathBuf,
    header: DataFileHeader,
    options: ReadOptions,
    charset_override: Option<Charset>,
}

impl ParadoxTable {
    /// Parses the table header. Companion files are only touched on request.
    pub fn open<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Self, DatabaseError> {
        let path = path.as_ref().to_path_buf();
        let charset_override = options.charset_override()?;
        let mut file = File::open(&path)?;
        let header = DataFileHeader::read_table(&mut file, &display_name(&path), charset_override)?;
        Ok(Self {
            path,
            header,
            options: options.clone(),
            charset_override,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &DataFileHeader {
        &self.header
    }

    pub fn fields(&self) -> &[Field] {
        &self.header.fields
    }

    pub fn charset(&self) -> Charset {
        self.header.charset
    }

    /// A fresh scanner; concurrent scans each own their file handle and buffer.
    pub fn scanner(&self, requested: Option<&[&str]>) -> Result<BlockScanner, DatabaseError> {
        let file = File::open(&self.path)?;
        BlockScanner::new(file, self.header.clone(), requested)
    }

    pub fn blob_session(&self) -> BlobSession {
        BlobSession::with_extension(&self.path, &self.options.blob_extension)
    }

    /// The `.PX` primary key, if the table has one. A broken file is fatal.
    pub fn load_primary_key(&self) -> Result<Option<PrimaryKeyHeader>, DatabaseError> {
        let Some(path) = find_optional_companion(&self.path, &self.options.primary_key_extension)?
        else {
            return Ok(None);
        };
        let mut file = File::open(&path)?;
        let name = display_name(&path);
        let mut key = PrimaryKeyHeader::read(&mut file, &name, self.charset_override)?;
        if !key.is_valid() {
            return Err(DatabaseError::invalid_header(
                name,
                format!("file type {} is not a primary key", key.header.file_type),
            ));
        }
        key.bind_names(&self.header.fields);
        Ok(Some(key))
    }

    /// Secondary indexes (`.Xnn` / `.XGn`). Unreadable or invalid files become warnings.
    pub fn load_indexes(&self) -> WithWarnings<Vec<IndexHeader>> {
        let mut result = WithWarnings::new(Vec::new());
        let paths = match companions_matching(&self.path, is_secondary_index_extension) {
            Ok(paths) => paths,
            Err(e) => {
                result.push(Warning::Index {
                    file: self.path.display().to_string(),
                    reason: e.to_string(),
                });
                return result;
            }
        };

        for path in paths {
            let name = display_name(&path);
            let parsed = File::open(&path)
                .map_err(DatabaseError::from)
                .and_then(|mut file| IndexHeader::read(&mut file, &name, self.charset_override));
            match parsed {
                Ok(index) if index.is_valid() => result.value.push(index),
                Ok(index) => result.push(Warning::Index {
                    file: name,
                    reason: format!("file type {} is not an index", index.header.file_type),
                }),
                Err(e) => result.push(Warning::Index {
                    file: name,
                    reason: e.to_string(),
                }),
            }
        }
        result
    }

    /// Validation constraints from the `.VAL` companion, best-effort.
    pub fn load_validation(&self) -> WithWarnings<Option<ValidationData>> {
        let found = find_optional_companion(&self.path, &self.options.validation_extension);
        let path = match found {
            Ok(Some(path)) => path,
            Ok(None) => return WithWarnings::new(None),
            Err(e) => {
                return WithWarnings::with_warning(
                    None,
                    Warning::Validation {
                        file: self.path.display().to_string(),
                        reason: e.to_string(),
                    },
                );
            }
        };

        let name = display_name(&path);
        match File::open(&path) {
            Ok(mut file) => read_validation(&mut file, &name, &self.header.fields, self.header.charset),
            Err(e) => WithWarnings::with_warning(
                None,
                Warning::Validation {
                    file: name,
                    reason: e.to_string(),
                },
            ),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
