//! Error types for the ClickHouse client library.

use thiserror::Error;

/// Errors that can occur while executing commands and decoding result sets.
#[derive(Error, Debug)]
pub enum ClickHouseError {
    /// A declared type string names a type the grammar does not know.
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// A declared type string is structurally invalid (bad parentheses,
    /// wrong arity, unparseable parameter).
    #[error("Malformed type '{type_name}': {message}")]
    MalformedType { type_name: String, message: String },

    /// The wire stream ended in the middle of a row or value.
    #[error("Stream ended unexpectedly mid-row")]
    TruncatedStream,

    /// A row violates its format's grammar (bad literal, wrong field count,
    /// corrupt dictionary index).
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// A decoded enum code has no symbolic mapping in the column's type.
    #[error("Unknown enum value: {0}")]
    UnknownEnumValue(String),

    /// The requested operation cannot be expressed for the selected format.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The reader was used outside its contract (no current row, field
    /// index out of range).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A single-row accessor was used against zero or more than one row.
    #[error("Expected exactly one row, got {actual}")]
    UnexpectedRowCount { actual: usize },

    /// The command was cancelled before the read completed.
    #[error("Command was cancelled")]
    Cancelled,

    /// Network-level failure talking to the server.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("Server returned error {status_code}: {message}")]
    Server { status_code: u16, message: String },

    /// The operation did not complete within the configured timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Response payload could not be deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ClickHouseError {
    pub(crate) fn malformed_type(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ClickHouseError::MalformedType {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// True when the error is the distinct cancelled state.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClickHouseError::Cancelled)
    }
}

impl From<reqwest::Error> for ClickHouseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClickHouseError::Timeout(err.to_string())
        } else {
            ClickHouseError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClickHouseError {
    fn from(err: serde_json::Error) -> Self {
        ClickHouseError::Serialization(err.to_string())
    }
}

/// Result type for ClickHouse client operations.
pub type Result<T> = std::result::Result<T, ClickHouseError>;
