use axum::http::StatusCode;

use super::results::ResultCacheError;
use super::upload::MAX_FILE_SIZE;
use super::validator::RowError;
use crate::spreadsheet::SpreadsheetError;

/// Everything that aborts an import request before or around provisioning.
/// Per-record provisioning failures are outcomes, not errors.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("File size exceeds {}MB limit", MAX_FILE_SIZE / 1024 / 1024)]
    FileTooLarge,
    #[error("Invalid file type. Only .xlsx, .xls files are allowed")]
    InvalidFileType,
    #[error("Content type '{content_type}' does not match extension '.{extension}'")]
    ContentTypeMismatch {
        content_type: String,
        extension: String,
    },
    #[error("{0}")]
    MalformedFile(String),
    #[error("Excel file contains no user data")]
    EmptyData,
    #[error("Import limit exceeded. Maximum {max} users per import")]
    BatchTooLarge { max: usize },
    #[error("Row {row}: {reason}")]
    RowValidation { row: usize, reason: RowError },
    #[error("Failed to generate results file: {0}")]
    Report(#[source] SpreadsheetError),
    #[error("Failed to store import results: {0}")]
    ResultStore(#[from] ResultCacheError),
}

impl ImportError {
    pub fn status(&self) -> StatusCode {
        match self {
            ImportError::Report(_) | ImportError::ResultStore(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<SpreadsheetError> for ImportError {
    fn from(e: SpreadsheetError) -> Self {
        match e {
            SpreadsheetError::NoDataRows => ImportError::EmptyData,
            SpreadsheetError::TooManyRows { max } => ImportError::BatchTooLarge { max },
            other => ImportError::MalformedFile(other.to_string()),
        }
    }
}
