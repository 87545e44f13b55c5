//! Error types for ZyronDB.

use thiserror::Error;

/// Result type alias using ZyronError.
pub type Result<T> = std::result::Result<T, ZyronError>;

/// Errors that can occur in ZyronDB operations.
#[derive(Debug, Error)]
pub enum ZyronError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Buffer errors
    #[error("Buffer pool full, unable to allocate frame")]
    BufferPoolFull,

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    // Adaptive hash index errors
    #[error("Invalid record reference: page {page_id}, offset {offset}")]
    InvalidRecord { page_id: u64, offset: u16 },

    #[error("Hash table corrupted: {0}")]
    HashTableCorrupted(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}

impl ZyronError {
    /// Shorthand for an `InvalidParameter` error.
    pub fn invalid_parameter(name: &str, value: impl ToString) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}
