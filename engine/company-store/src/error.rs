//! Error types for the company store

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by [`crate::CompanyStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Empty or whitespace-only company name
    #[error("Invalid company name: {0:?}")]
    InvalidName(String),

    /// Numeric field outside its allowed range
    #[error("Invalid value for {field}: {value}")]
    InvalidField { field: &'static str, value: f64 },

    /// Storage read or write failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl StoreError {
    /// Whether the error was a rejected input rather than a storage failure
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidName(_) | Self::InvalidField { .. })
    }
}

/// Errors that can occur in a storage backend
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data exists but cannot be understood
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Backend refused the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl PersistenceError {
    /// Create a new corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create a new unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
