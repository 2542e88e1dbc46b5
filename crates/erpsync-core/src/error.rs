//! Error types for erpsync-core

use thiserror::Error;

use crate::models::ReferenceKind;

/// Result type alias using erpsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in erpsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote server unreachable or the target database does not exist
    #[error("Connection error: {0}")]
    Connection(String),

    /// Remote server rejected the credentials
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Remote procedure returned a fault
    #[error("Remote call failed: {0}")]
    Rpc(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local store error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A mandatory reference of a remote record could not be resolved locally
    #[error("{kind} not found: {key}")]
    Reference { kind: ReferenceKind, key: String },

    /// A spreadsheet row could not be interpreted
    #[error("Row {row}: {message}")]
    RowFormat { row: usize, message: String },

    /// A spreadsheet cell holds an error value
    #[error("Invalid cell value at row {row}, column {col}: {value}")]
    CellValue {
        row: usize,
        col: usize,
        value: String,
    },

    /// The workbook could not be opened
    #[error("Workbook error: {0}")]
    Workbook(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Aggregated validation failure, usually listing per-row errors
    #[error("{0}")]
    Validation(String),
}

impl Error {
    pub fn reference(kind: ReferenceKind, key: impl Into<String>) -> Self {
        Self::Reference {
            kind,
            key: key.into(),
        }
    }

    pub fn row_format(row: usize, message: impl Into<String>) -> Self {
        Self::RowFormat {
            row,
            message: message.into(),
        }
    }

    /// Whether the error only affects a single record or row.
    ///
    /// Everything else aborts the remaining run.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Reference { .. } | Self::RowFormat { .. })
    }
}

impl From<calamine::XlsxError> for Error {
    fn from(error: calamine::XlsxError) -> Self {
        Self::Workbook(error.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(error: base64::DecodeError) -> Self {
        Self::Workbook(format!("invalid base64 payload: {error}"))
    }
}
