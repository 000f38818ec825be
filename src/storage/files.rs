use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::types::error::DatabaseError;

fn same_stem(candidate: &Path, stem: &str) -> bool {
    candidate
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.eq_ignore_ascii_case(stem))
}

fn extension_of(candidate: &Path) -> Option<&str> {
    candidate.extension().and_then(|e| e.to_str())
}

/// Lists files next to `path` sharing its base name whose extension satisfies `accept`.
pub fn companions_matching(
    path: &Path,
    accept: impl Fn(&str) -> bool,
) -> Result<Vec<PathBuf>, DatabaseError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return Ok(Vec::new());
    };

    let mut found = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let candidate = entry.path();
        if !candidate.is_file() || candidate == path {
            continue;
        }
        if same_stem(&candidate, stem) && extension_of(&candidate).is_some_and(&accept) {
            found.push(candidate);
        }
    }
    found.sort();
    Ok(found)
}

/// Zero matches yield `None`; more than one is an error.
pub fn find_optional_companion(
    path: &Path,
    extension: &str,
) -> Result<Option<PathBuf>, DatabaseError> {
    let mut found = companions_matching(path, |ext| ext.eq_ignore_ascii_case(extension))?;
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        _ => Err(DatabaseError::CompanionAmbiguous {
            path: path.to_path_buf(),
            extension: extension.to_string(),
            candidates: found,
        }),
    }
}

/// Exactly one companion with `extension` must exist.
pub fn find_companion(path: &Path, extension: &str) -> Result<PathBuf, DatabaseError> {
    find_optional_companion(path, extension)?.ok_or_else(|| DatabaseError::CompanionNotFound {
        path: path.to_path_buf(),
        extension: extension.to_string(),
    })
}

/// Secondary index files use `.Xnn` / `.XGn` extensions.
pub fn is_secondary_index_extension(ext: &str) -> bool {
    let bytes = ext.as_bytes();
    bytes.len() == 3
        && bytes[0].eq_ignore_ascii_case(&b'x')
        && bytes[1..].iter().all(|b| b.is_ascii_alphanumeric())
}
