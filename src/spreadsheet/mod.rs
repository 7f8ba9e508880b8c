//! Single-sheet Office Open XML (`.xlsx`) reader and writer.
//!
//! Decoding turns the first worksheet into header-keyed rows; encoding writes a
//! one-sheet workbook. Both the import template and the results report go
//! through [`encode`].

mod reader;
#[cfg(test)]
pub(crate) mod test_support;
mod writer;

use indexmap::IndexMap;

pub use reader::decode;
pub use writer::{encode, SheetLayout};

/// Value of a single cell as the importer sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text form used for free-form fields such as names.
    pub fn to_display_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => number_to_string(*n),
            CellValue::Bool(b) => b.to_string(),
        }
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

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

fn number_to_string(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One data row keyed by header name, in column order.
pub type RawRow = IndexMap<String, CellValue>;

#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("{0}")]
    Malformed(String),
    #[error("Excel file contains no sheets")]
    NoSheets,
    #[error("Excel file contains no user data")]
    NoDataRows,
    #[error("Sheet has more than {max} data rows")]
    TooManyRows { max: usize },
    #[error("failed to write workbook: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to write workbook: {0}")]
    Io(#[from] std::io::Error),
}
