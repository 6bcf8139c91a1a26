//! Workbook reading via `calamine` and first-sheet serialization to CSV or JSON.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use serde_json::{Map, Number, Value};
use std::io::Cursor;

use crate::traits::{guard_panics, CodecError, CodecResult, SpreadsheetCodec};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Cell {
    fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }

    fn to_json(&self) -> Option<Value> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(Value::String(s.clone())),
            Cell::Int(i) => Some(Value::Number((*i).into())),
            Cell::Float(f) => Some(Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)),
            Cell::Bool(b) => Some(Value::Bool(*b)),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) => Cell::Float(*f),
            Data::Bool(b) => Cell::Bool(*b),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// A rectangular grid of cells; the first row is treated as the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn from_range(range: &Range<Data>) -> Self {
        Self {
            rows: range
                .rows()
                .map(|row| row.iter().map(Cell::from).collect())
                .collect(),
        }
    }

    /// RFC 4180 style: fields containing a comma, quote or line break are quoted.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            let line = row
                .iter()
                .map(|cell| quote_csv_field(&cell.as_text()))
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Array of row objects keyed by the header row. Empty cells are omitted;
    /// header cells that are blank get a positional `__EMPTY_<n>` key.
    pub fn to_json(&self) -> CodecResult<String> {
        let mut rows = self.rows.iter();
        let header: Vec<String> = match rows.next() {
            Some(header) => header
                .iter()
                .enumerate()
                .map(|(i, cell)| match cell.as_text() {
                    text if text.is_empty() => format!("__EMPTY_{}", i),
                    text => text,
                })
                .collect(),
            None => return Ok("[]".to_string()),
        };

        let records: Vec<Value> = rows
            .map(|row| {
                let mut object = Map::new();
                for (i, cell) in row.iter().enumerate() {
                    if let Some(value) = cell.to_json() {
                        let key = header
                            .get(i)
                            .cloned()
                            .unwrap_or_else(|| format!("__EMPTY_{}", i));
                        object.insert(key, value);
                    }
                }
                Value::Object(object)
            })
            .filter(|value| value.as_object().is_some_and(|o| !o.is_empty()))
            .collect();

        serde_json::to_string_pretty(&records)
            .map_err(|e| CodecError::codec(format!("JSON serialization failed: {}", e)))
    }
}

fn quote_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Append CSV documents, keeping the first header and dropping identical
/// header lines at the top of later documents.
pub fn append_csv(documents: &[&str]) -> String {
    let mut out = String::new();
    let mut header: Option<&str> = None;
    for document in documents {
        let mut lines = document.lines().peekable();
        match (header, lines.peek()) {
            (None, Some(first)) => header = Some(*first),
            (Some(h), Some(first)) if *first == h => {
                lines.next();
            }
            _ => {}
        }
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Reads `.xlsx` and `.xls` workbooks, detecting the format from content.
#[derive(Debug, Default, Clone, Copy)]
pub struct CalamineReader;

impl SpreadsheetCodec for CalamineReader {
    fn first_sheet(&self, data: &[u8]) -> CodecResult<Sheet> {
        guard_panics("Spreadsheet parsing", || {
            let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))
                .map_err(|e| CodecError::corrupt(format!("Failed to open workbook: {}", e)))?;
            let range = workbook
                .worksheet_range_at(0)
                .ok_or_else(|| CodecError::corrupt("Workbook has no worksheets"))?
                .map_err(|e| CodecError::corrupt(format!("Failed to read first sheet: {}", e)))?;
            Ok(Sheet::from_range(&range))
        })
    }
}
