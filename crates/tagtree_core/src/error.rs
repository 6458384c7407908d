//! Error types for tagtree core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in tagtree operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage plumbing error.
    #[error("storage error: {0}")]
    Storage(#[from] tagtree_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A blob was submitted with a tag smaller than the last written tag.
    #[error("tag order violation: last written tag was {last} and tried to write a smaller tag {attempted}")]
    TagOrderViolation {
        /// The newest tag accepted by this writer session.
        last: i64,
        /// The rejected smaller tag.
        attempted: i64,
    },

    /// A blob payload exceeds the i32 length prefix.
    #[error("blob too large: {len} bytes exceeds the maximum of {max}", max = i32::MAX)]
    BlobTooLarge {
        /// The oversized payload length.
        len: usize,
    },

    /// The index file contains an impossible offset, length, or sequence.
    #[error("corrupt index: {message}")]
    CorruptIndex {
        /// Description of the corruption.
        message: String,
    },
}

impl CoreError {
    /// Creates a corrupt index error.
    pub fn corrupt_index(message: impl Into<String>) -> Self {
        Self::CorruptIndex {
            message: message.into(),
        }
    }
}
