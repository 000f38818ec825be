//! Saved QBE query views (`.QBE`).
//!
//! ```text
//! Query
//! ANSWER: :PRIV:ANSWER.DB
//!
//! FIELDORDER: customer.db->"Name", customer.db->"City",
//! orders.db->"Total"
//!
//! SORT: customer.db->"Name"
//!
//! Customer.db | Name          | City         |
//!             | Check _join1  | Check as Town|
//!
//! EndQuery
//! ```

use std::{
    collections::HashMap,
    io::{BufReader, Read},
};

use crate::{
    storage::{charset::Charset, header::table_stem},
    types::{
        error::{DatabaseError, Warning, WithWarnings},
        field::Field,
    },
};

pub const VIEW_HEADER: &str = "Query";
pub const VIEW_TERMINATOR: &str = "EndQuery";
pub const DEFAULT_VIEW_EXTENSION: &str = "qbe";

const READ_BUFFER_SIZE: usize = 2048;
const ANSWER_PREFIX: &str = "ANSWER:";
const FIELD_ORDER_PREFIX: &str = "FIELDORDER: ";
const SORT_PREFIX: &str = "SORT: ";

/// Source of field lists for the tables a view references.
pub trait FieldCatalog {
    fn table_fields(&self, table: &str) -> Option<&[Field]>;
}

impl FieldCatalog for HashMap<String, Vec<Field>> {
    fn table_fields(&self, table: &str) -> Option<&[Field]> {
        if let Some(fields) = self.get(table) {
            return Some(fields);
        }
        let wanted = table_stem(table);
        self.iter()
            .find(|(name, _)| table_stem(name).eq_ignore_ascii_case(&wanted))
            .map(|(_, fields)| fields.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewField {
    pub table_name: String,
    pub field: Field,
    pub alias: Option<String>,
    pub expression: Option<String>,
    pub checked: bool,
    pub join_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParadoxView {
    pub name: String,
    pub valid: bool,
    pub answer_table: Option<String>,
    pub field_order: Vec<ViewField>,
    pub sort_order: Vec<ViewField>,
    pub fields: Vec<ViewField>,
}

impl ParadoxView {
    pub fn invalid(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Columns the view outputs, in `FIELDORDER` when present.
    pub fn output_fields(&self) -> Vec<&ViewField> {
        if !self.field_order.is_empty() {
            return self.field_order.iter().collect();
        }
        self.fields.iter().filter(|f| f.checked).collect()
    }
}

/// Marker flags and names parsed out of one expression cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedExpression {
    pub checked: bool,
    pub join_name: Option<String>,
    pub alias: Option<String>,
    pub expression: Option<String>,
}

/// Reads and parses a view file. Only I/O failures are errors; a file that
/// does not start with `Query` yields an invalid, empty view.
pub fn read_view<R: Read>(
    reader: R,
    name: &str,
    catalog: &dyn FieldCatalog,
    charset: Charset,
) -> Result<WithWarnings<ParadoxView>, DatabaseError> {
    let mut buffered = BufReader::with_capacity(READ_BUFFER_SIZE, reader);
    let mut bytes = Vec::new();
    buffered.read_to_end(&mut bytes)?;
    Ok(parse_view(&charset.decode(&bytes), name, catalog))
}

pub fn parse_view(text: &str, name: &str, catalog: &dyn FieldCatalog) -> WithWarnings<ParadoxView> {
    let mut lines = text.lines().map(str::trim_end).peekable();

    if lines.next().map(str::trim) != Some(VIEW_HEADER) {
        log::debug!("{name}: not a query view");
        return WithWarnings::new(ParadoxView::invalid(name));
    }

    let mut result = WithWarnings::new(ParadoxView {
        name: name.to_string(),
        valid: true,
        ..ParadoxView::default()
    });

    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == VIEW_TERMINATOR {
            break;
        }

        if let Some(rest) = trimmed.strip_prefix(ANSWER_PREFIX) {
            result.value.answer_table = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix(FIELD_ORDER_PREFIX) {
            let list = read_continued(rest, &mut lines);
            result.value.field_order = resolve_tokens(&list, catalog, &mut result.warnings);
        } else if let Some(rest) = trimmed.strip_prefix(SORT_PREFIX) {
            let list = read_continued(rest, &mut lines);
            result.value.sort_order = resolve_tokens(&list, catalog, &mut result.warnings);
        } else if trimmed.contains('|') {
            let expressions = loop {
                match lines.peek().copied().map(str::trim) {
                    Some("") => {
                        lines.next();
                    }
                    Some(l) if l.starts_with('|') => break lines.next(),
                    _ => break None,
                }
            };
            let fields = table_block(line, expressions, catalog, &mut result.warnings);
            result.value.fields.extend(fields);
        } else {
            log::debug!("{name}: skipping line '{trimmed}'");
        }
    }

    for warning in &result.warnings {
        log::warn!("{name}: {warning}");
    }
    result
}

/// Joins a comma-continued list: a line ending in ',' continues on the next line.
fn read_continued<'a, I>(first: &str, lines: &mut std::iter::Peekable<I>) -> String
where
    I: Iterator<Item = &'a str>,
{
    let mut list = first.trim().to_string();
    while list.ends_with(',') {
        match lines.next() {
            Some(next) => {
                list.push(' ');
                list.push_str(next.trim());
            }
            None => break,
        }
    }
    list
}

/// Splits on commas outside double quotes.
fn split_tokens(list: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                tokens.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(list[start..].trim());
    tokens.retain(|t| !t.is_empty());
    tokens
}

/// Parses `table->"field"`.
fn parse_token(token: &str) -> Option<(&str, &str)> {
    let (table, field) = token.split_once("->")?;
    Some((table.trim(), field.trim().trim_matches('"')))
}

fn resolve_field(
    table: &str,
    name: &str,
    catalog: &dyn FieldCatalog,
    warnings: &mut Vec<Warning>,
) -> Field {
    catalog
        .table_fields(table)
        .and_then(|fields| fields.iter().find(|f| f.is_named(name)))
        .cloned()
        .unwrap_or_else(|| {
            warnings.push(Warning::UnresolvedViewField {
                table: table.to_string(),
                field: name.to_string(),
            });
            Field::unknown(name, &table_stem(table))
        })
}

fn resolve_tokens(
    list: &str,
    catalog: &dyn FieldCatalog,
    warnings: &mut Vec<Warning>,
) -> Vec<ViewField> {
    split_tokens(list)
        .into_iter()
        .filter_map(parse_token)
        .map(|(table, name)| ViewField {
            table_name: table.to_string(),
            field: resolve_field(table, name, catalog, warnings),
            ..ViewField::default()
        })
        .collect()
}

/// Cells after the leading table (or blank) cell, without the trailing empty cell.
fn cells(line: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = line.split('|').map(str::trim).collect();
    if parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

fn table_block(
    header_line: &str,
    expression_line: Option<&str>,
    catalog: &dyn FieldCatalog,
    warnings: &mut Vec<Warning>,
) -> Vec<ViewField> {
    let header = cells(header_line);
    let Some((table, names)) = header.split_first() else {
        return Vec::new();
    };
    let expressions = expression_line.map(cells).unwrap_or_default();

    names
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .map(|(i, name)| {
            // expression cells line up after their own leading blank cell
            let raw = expressions.get(i + 1).copied().unwrap_or("");
            let parsed = parse_expression(raw);
            ViewField {
                table_name: table.to_string(),
                field: resolve_field(table, name, catalog, warnings),
                alias: parsed.alias,
                expression: parsed.expression,
                checked: parsed.checked,
                join_name: parsed.join_name,
            }
        })
        .collect()
}

fn split_first_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

/// ASCII-only prefix match; cells may hold any decoded text.
fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.as_bytes().get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix.as_bytes()) {
        s.get(prefix.len()..)
    } else {
        None
    }
}

/// Parses one expression cell: `Check`, `_join`, `AS alias`, `CALC ...`.
pub fn parse_expression(raw: &str) -> ParsedExpression {
    let mut parsed = ParsedExpression::default();
    let mut rest = raw.trim();

    let (word, after) = split_first_word(rest);
    if word.starts_with("Check") {
        parsed.checked = true;
        rest = after;
    }

    if rest.starts_with('_') {
        let (join, after) = split_first_word(rest);
        parsed.join_name = Some(join.trim_start_matches('_').trim_end_matches(',').to_string());
        rest = after.trim_start_matches(',').trim_start();
    }

    if let Some(alias) = strip_prefix_ignore_case(rest, "as ") {
        parsed.alias = Some(alias.trim().to_string());
    } else if let Some(i) = find_ignore_case(rest, " as ") {
        parsed.expression = Some(rest[..i].trim().to_string());
        parsed.alias = Some(rest[i + 4..].trim().to_string());
    } else if !rest.is_empty() {
        parsed.expression = Some(rest.to_string());
    }

    if parsed
        .expression
        .as_deref()
        .is_some_and(|e| strip_prefix_ignore_case(e, "calc").is_some())
    {
        parsed.checked = true;
    }
    parsed
}
