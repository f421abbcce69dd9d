use std::error::Error;
use std::fmt::Display;

/// Error type for record store operations
#[derive(Debug)]
pub enum StoreError {
    /// Error reading or writing a data file
    Io(String),
    /// Error parsing JSON data
    Parse(String),
    /// A requested entity does not exist
    NotFound(String),
    /// Input failed validation
    Validation(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "I/O error: {}", msg),
            StoreError::Parse(msg) => write!(f, "Parse error: {}", msg),
            StoreError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StoreError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Parse(err.to_string())
    }
}
