//! Minimal OOXML spreadsheet codec
//!
//! Only what client intake and forecast output need: sheets of rows holding
//! numbers and strings. Formatting, formulas and shared-string writing are
//! out of scope. The rest of the crate sees workbooks only through
//! [`SpreadsheetReader`] and [`SpreadsheetWriter`].

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::WorkbookError;

pub mod cell;
mod reader;
mod writer;
pub mod xml;

pub use cell::{column_name, sanitize_sheet_name};
pub use reader::OoxmlReader;
pub use writer::OoxmlWriter;

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// Numeric reading of the cell; text is parsed after trimming.
    /// Non-finite values read as `None`.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            CellValue::Number(v) => *v,
            CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
            CellValue::Empty => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Display text of the cell, numbers included
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            CellValue::Number(v) => v.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Empty => String::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(CellValue::Empty, CellValue::Number)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// One named sheet: rows of cells starting at column A
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkbookSheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl WorkbookSheet {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: impl IntoIterator<Item = CellValue>) {
        self.rows.push(row.into_iter().collect());
    }

    /// Column A labels mapped to column B values
    #[must_use]
    pub fn labeled(&self) -> LabeledSheet {
        let mut sheet = LabeledSheet {
            name: self.name.clone(),
            ..LabeledSheet::default()
        };
        for row in &self.rows {
            let Some(label) = row.first().filter(|c| !c.is_empty()) else {
                continue;
            };
            let value = row.get(1).cloned().unwrap_or(CellValue::Empty);
            sheet.insert(label.text(), value);
        }
        sheet
    }
}

/// Label/value pairs of a sheet in first-seen order. A repeated label keeps
/// its first position and takes the later value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabeledSheet {
    pub name: String,
    entries: Vec<(String, CellValue)>,
    positions: FxHashMap<String, usize>,
}

impl LabeledSheet {
    pub fn insert(&mut self, label: String, value: CellValue) {
        match self.positions.get(&label) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.positions.insert(label.clone(), self.entries.len());
                self.entries.push((label, value));
            }
        }
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&CellValue> {
        self.positions.get(label).map(|&i| &self.entries[i].1)
    }

    /// First entry whose trimmed label equals `label`, ignoring case
    #[must_use]
    pub fn get_ignore_case(&self, label: &str) -> Option<&CellValue> {
        self.entries
            .iter()
            .find(|(l, _)| l.trim().eq_ignore_ascii_case(label))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source of sheets
pub trait SpreadsheetReader {
    fn read_sheets(&self, path: &Path) -> Result<Vec<WorkbookSheet>, WorkbookError>;
}

/// Sink for sheets. Implementations own their output buffer exclusively.
pub trait SpreadsheetWriter {
    fn write_sheets(&self, path: &Path, sheets: &[WorkbookSheet]) -> Result<(), WorkbookError>;
}
