//! # Tagtree Core
//!
//! An append-only, tag-indexed blob store with sub-linear random access.
//!
//! A [`TreeWriter`] appends blobs in monotonically non-decreasing tag order
//! to a pair of files; any number of [`TreeReader`]s on the same path search
//! by tag concurrently. The index file embeds skip-list back pointers in
//! every record, so lookups descend from the tail in O(log N) disk reads
//! without an in-memory catalogue and without ever rewriting earlier records.
//!
//! ## File pair
//!
//! A store at base path `P` consists of:
//!
//! - the **content file** `P`: concatenated `{ i32 len; u8 bytes[len]; }`
//!   payload records, no framing, no header
//! - the **index file** `P.index`: one record per blob, in append order
//!
//! ## Index record format
//!
//! Record number `s` (1-origin) occupies `height(s) * 16 + 20` bytes:
//!
//! ```text
//! | back pointers, level 0 first   | height(s) * 16 bytes        |
//! |   each: i64 tag, i64 offset    |                             |
//! | payload_offset                 | i64                         |
//! | seq                            | i32                         |
//! | tag                            | i64                         |
//! ```
//!
//! The trailing 12 bytes (`seq`, `tag`) are the record's **header suffix**;
//! back pointers address the header-suffix position of their target, and the
//! reader finds the newest record at the last 12 bytes of the file. All
//! integers are two's-complement big-endian.
//!
//! ## Concurrency
//!
//! Readers and writers on the same base path share one process-wide
//! read/write lock. The writer takes it only around the short commit step,
//! so a blob being buffered is invisible until its sink closes, and a reader
//! that starts after a commit returned always sees both the record and its
//! payload.
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Write;
//! use std::path::Path;
//! use tagtree_core::{TreeReader, TreeWriter};
//!
//! # fn main() -> tagtree_core::CoreResult<()> {
//! let mut writer = TreeWriter::open(Path::new("events"))?;
//! let mut sink = writer.write_next(100)?;
//! sink.write_all(b"payload bytes")?;
//! sink.close()?;
//!
//! let reader = TreeReader::open(Path::new("events"))?;
//! let blob = reader.at(100)?.unwrap();
//! assert_eq!(blob.payload(), b"payload bytes");
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod codec;
mod config;
mod error;
mod layout;
mod locks;
mod paths;
mod reader;
mod writer;

pub use blob::Blob;
pub use config::WriterConfig;
pub use error::{CoreError, CoreResult};
pub use reader::TreeReader;
pub use writer::{BlobSink, TreeWriter};
