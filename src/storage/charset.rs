use std::fmt;

use encoding_rs::Encoding;
use oem_cp::code_table::{DECODING_TABLE_CP437, DECODING_TABLE_CP850};

use crate::{
    storage::buffer::ByteCursor,
    types::{MINIMUM_VERSION, error::DatabaseError, error::Warning},
};

pub const DEFAULT_CODE_PAGE: u16 = 437;

const CODE_PAGE_OFFSET: usize = 0x6A;
const FIELDS_OFFSET_LEGACY: usize = 0x58;
const FIELDS_OFFSET_V4: usize = 0x78;

// Some writers store IBM437 in the header of tables that are really Windows-1252.
const MISREPORTED_CODE_PAGE: u16 = 0x1B5;
const MISREPORTED_REPLACEMENT: u16 = 0x4E4;

/// Single-byte legacy encodings used for names and string payloads.
#[derive(Clone, Copy, PartialEq)]
pub enum Charset {
    Cp437,
    Cp850,
    Encoding(&'static Encoding),
}

impl Charset {
    /// Resolves a user-supplied label such as `cp437`, `windows-1252` or `1250`.
    pub fn for_label(label: &str) -> Result<Self, DatabaseError> {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "cp437" | "ibm437" | "437" => return Ok(Charset::Cp437),
            "cp850" | "ibm850" | "850" => return Ok(Charset::Cp850),
            _ => {}
        }
        if let Ok(code_page) = normalized.trim_start_matches("cp").parse::<u16>() {
            if let Some(charset) = Self::for_code_page(code_page) {
                return Ok(charset);
            }
        }
        Encoding::for_label(normalized.as_bytes())
            .map(Charset::Encoding)
            .ok_or_else(|| DatabaseError::Config {
                details: format!("unknown charset '{label}'"),
            })
    }

    pub fn for_code_page(code_page: u16) -> Option<Self> {
        match code_page {
            437 => Some(Charset::Cp437),
            850 => Some(Charset::Cp850),
            other => codepage::to_encoding(other).map(Charset::Encoding),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Charset::Cp437 => "IBM437",
            Charset::Cp850 => "IBM850",
            Charset::Encoding(encoding) => encoding.name(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Cp437 => oem_cp::decode_string_complete_table(bytes, &DECODING_TABLE_CP437),
            Charset::Cp850 => oem_cp::decode_string_complete_table(bytes, &DECODING_TABLE_CP850),
            Charset::Encoding(encoding) => encoding
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
        }
    }
}

impl Default for Charset {
    fn default() -> Self {
        Charset::Cp437
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Charset({})", self.name())
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCharset {
    pub charset: Charset,
    /// Code page as stored in the header, before any remapping.
    pub code_page: u16,
    pub warning: Option<Warning>,
}

/// Maps a header code page to a charset, applying the IBM437/Windows-1252 remap.
pub fn charset_for_code_page(code_page: u16) -> (Charset, Option<Warning>) {
    let effective = if code_page == MISREPORTED_CODE_PAGE {
        MISREPORTED_REPLACEMENT
    } else {
        code_page
    };
    match Charset::for_code_page(effective) {
        Some(charset) => (charset, None),
        None => {
            let warning = Warning::UnknownCharset { code_page };
            log::warn!("{warning}");
            (Charset::Cp437, Some(warning))
        }
    }
}

/// Reads the code page (for versions past 4) and leaves the cursor at the
/// start of the field descriptor array. An explicit override always wins.
pub fn resolve_charset(
    cursor: &mut ByteCursor<'_>,
    version_id: u8,
    override_charset: Option<Charset>,
) -> Result<ResolvedCharset, DatabaseError> {
    let (code_page, detected, warning) = if version_id > MINIMUM_VERSION {
        cursor.seek(CODE_PAGE_OFFSET)?;
        let code_page = cursor.read_u16()?;
        let (charset, warning) = charset_for_code_page(code_page);
        cursor.seek(FIELDS_OFFSET_V4)?;
        (code_page, charset, warning)
    } else {
        cursor.seek(FIELDS_OFFSET_LEGACY)?;
        (DEFAULT_CODE_PAGE, Charset::Cp437, None)
    };

    Ok(ResolvedCharset {
        charset: override_charset.unwrap_or(detected),
        code_page,
        warning,
    })
}
