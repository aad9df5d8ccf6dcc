//! Error types for the storage engine.

use crate::types::PageId;
use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from the underlying file system
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Page numbers start at 1
    #[error("Invalid page number {0}")]
    InvalidPageNumber(PageId),

    /// A page write was handed a buffer of the wrong length
    #[error("Page data must be {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A buffer handed to the page decoder is not exactly one page
    #[error("Invalid page size: {0} bytes")]
    InvalidPageSize(usize),

    /// The page type tag is neither leaf nor internal
    #[error("Invalid page type tag 0x{0:02X}")]
    InvalidPageType(u8),

    /// A row buffer is truncated or otherwise undecodable
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// An internal cell has no key terminator or a short child pointer
    #[error("Malformed internal cell: {0}")]
    MalformedInternalCell(String),

    /// Encoded page contents exceed the page size
    #[error("Page overflow: need {needed} bytes but only {available} available")]
    PageOverflow { needed: usize, available: usize },

    /// Key not found (for operations that require existing key)
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// A row with the same primary key is already stored
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The key cannot be stored as a separator
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A traversal reached the same page twice
    #[error("Cycle detected at page {0}")]
    CycleDetected(PageId),

    /// The catalog page has no room for another entry
    #[error("Catalog full: need {needed} bytes but only {available} available")]
    CatalogFull { needed: usize, available: usize },

    /// Data corruption detected (e.g., offsets outside the page)
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Invalid operation for the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl StorageError {
    /// Create a corruption error with a message
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create a malformed record error
    pub fn malformed_record(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }

    /// Create a malformed internal cell error
    pub fn malformed_cell(msg: impl Into<String>) -> Self {
        Self::MalformedInternalCell(msg.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }
}
