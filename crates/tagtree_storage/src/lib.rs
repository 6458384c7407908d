//! # Tagtree Storage
//!
//! Byte-level file plumbing for tagtree.
//!
//! This crate provides the lowest-level I/O building blocks for the store.
//! Everything here is an **opaque byte pipe** - nothing in this crate
//! understands index records, back pointers, or blobs.
//!
//! ## Components
//!
//! - [`CountingWriter`] - wraps a byte sink and tracks the total bytes
//!   delivered, so callers can derive the current file offset without a
//!   system call
//! - [`ReadOnlyFile`] - positioned reads over a read-only file with bounds
//!   checking against the live file length

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod counting;
mod error;
mod file;

pub use counting::CountingWriter;
pub use error::{StorageError, StorageResult};
pub use file::ReadOnlyFile;
