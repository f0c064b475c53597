//! Tab-delimited grid payload decoding.
//!
//! The trading client copies and exports its grids as tab-separated text:
//! the first line names the columns, every following line is one on-screen
//! row. Cells are typed by a [`ColumnTypes`] table. Empty cells always stay
//! empty strings, whatever the column type.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use encoding_rs::Encoding;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

use crate::error::GridError;

/// How the cells of one column are cast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Keep the text as-is.
    #[default]
    Str,
    Int,
    Float,
    /// Integer if it parses, then float, otherwise text.
    Auto,
}

impl ColumnType {
    /// Cast a raw cell. Returns `None` when the text does not fit the type.
    pub fn cast(self, raw: &str) -> Option<CellValue> {
        if raw.is_empty() {
            return Some(CellValue::Text(String::new()));
        }
        match self {
            ColumnType::Str => Some(CellValue::Text(raw.to_string())),
            ColumnType::Int => raw.trim().parse().ok().map(CellValue::Int),
            ColumnType::Float => parse_finite(raw).map(CellValue::Float),
            ColumnType::Auto => {
                if let Ok(n) = raw.trim().parse() {
                    Some(CellValue::Int(n))
                } else if let Some(x) = parse_finite(raw) {
                    Some(CellValue::Float(x))
                } else {
                    Some(CellValue::Text(raw.to_string()))
                }
            }
        }
    }
}

// `f64::from_str` also takes "NaN" and "inf", which are text in a grid.
fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Str => write!(f, "str"),
            ColumnType::Int => write!(f, "int"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "str" | "string" | "text" => Ok(ColumnType::Str),
            "int" | "int64" | "integer" => Ok(ColumnType::Int),
            "float" | "float64" | "number" => Ok(ColumnType::Float),
            "auto" => Ok(ColumnType::Auto),
            other => Err(format!(
                "unknown column type '{}' (expected str, int, float or auto)",
                other
            )),
        }
    }
}

/// Column name to type table, with a type for unlisted columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnTypes {
    pub columns: BTreeMap<String, ColumnType>,
    pub fallback: ColumnType,
}

impl ColumnTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unlisted columns are inferred as int, then float, then text.
    pub fn auto() -> Self {
        Self {
            fallback: ColumnType::Auto,
            ..Self::default()
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, kind: ColumnType) -> Self {
        self.columns.insert(column.into(), kind);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, kind: ColumnType) {
        self.columns.insert(column.into(), kind);
    }

    pub fn type_of(&self, column: &str) -> ColumnType {
        self.columns.get(column).copied().unwrap_or(self.fallback)
    }
}

/// A decoded cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.is_empty())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Int(n)
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        CellValue::Float(x)
    }
}

/// One grid row, cells in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Serialized as a JSON object keeping column order.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Rows of one grid read, in on-screen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Set when the source file contained bytes the legacy encoding could
    /// not map; those were replaced with U+FFFD.
    #[serde(skip_serializing_if = "is_false")]
    pub lossy: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Structural decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,

    #[error("line {line}: expected {expected} cells, found {found}")]
    Ragged {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: cannot read '{value}' in column '{column}' as {expected}")]
    InvalidCell {
        line: u64,
        column: String,
        value: String,
        expected: ColumnType,
    },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<csv::Error> for DecodeError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => DecodeError::Ragged {
                line: pos.as_ref().map_or(0, |p| p.line()),
                expected: *expected_len as usize,
                found: *len as usize,
            },
            _ => DecodeError::Malformed(err.to_string()),
        }
    }
}

/// Suffix repeated header names with `.1`, `.2`, ... so every column has
/// its own key.
fn unique_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for header in headers {
        let mut name = header.to_string();
        let mut n = 0;
        while columns.contains(&name) {
            n += 1;
            name = format!("{}.{}", header, n);
        }
        columns.push(name);
    }
    columns
}

/// Decode tab-delimited text into rows.
pub fn decode_text(text: &str, types: &ColumnTypes) -> Result<RowSet, DecodeError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let columns = unique_columns(reader.headers()?.iter());
    let kinds: Vec<ColumnType> = columns.iter().map(|c| types.type_of(c)).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let mut cells = Vec::with_capacity(columns.len());
        for ((column, kind), raw) in columns.iter().zip(&kinds).zip(record.iter()) {
            let value = kind.cast(raw).ok_or_else(|| DecodeError::InvalidCell {
                line,
                column: column.clone(),
                value: raw.to_string(),
                expected: *kind,
            })?;
            cells.push((column.clone(), value));
        }
        rows.push(Row { cells });
    }

    Ok(RowSet {
        columns,
        rows,
        lossy: false,
    })
}

/// Decode an exported grid file written in a legacy encoding.
///
/// Unmappable bytes are replaced rather than rejected; the returned set is
/// then marked [`RowSet::lossy`].
pub fn decode_file(
    path: &Path,
    types: &ColumnTypes,
    encoding: &'static Encoding,
) -> Result<RowSet, GridError> {
    let bytes = std::fs::read(path).map_err(|source| GridError::io(path, source))?;
    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        warn!(
            path = %path.display(),
            encoding = encoding.name(),
            "export contains bytes that could not be mapped, replaced"
        );
    }

    let mut rows = decode_text(&text, types)?;
    rows.lossy = had_errors;
    Ok(rows)
}
