//! The append side of a store.

use crate::codec::{put_i32, put_i64};
use crate::config::WriterConfig;
use crate::error::{CoreError, CoreResult};
use crate::layout::{height, update_height, BACK_POINTER_LEN, HEADER_SUFFIX_LEN, MAX_LEVELS};
use crate::locks::lock_for;
use crate::paths::StorePaths;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tagtree_storage::CountingWriter;

/// A blob accumulating in memory before commit.
struct PendingBlob {
    tag: i64,
    payload: Vec<u8>,
}

/// Appends tagged blobs to a store.
///
/// A writer owns the append session for one base path: it creates (or
/// truncates) the content and index files on open, buffers one pending blob
/// at a time in memory, and commits each blob in a short critical section
/// under the store's shared write lock. Readers on the same path never see a
/// blob before its [`BlobSink`] is closed.
///
/// Tags must be monotonically non-decreasing across the session; a smaller
/// tag is rejected with [`CoreError::TagOrderViolation`]. Duplicate tags are
/// allowed.
///
/// Opening a second writer on a path that already has one is a user error:
/// the shared lock serialises commits but both writers would truncate and
/// interleave state.
pub struct TreeWriter {
    paths: StorePaths,
    lock: Arc<RwLock<()>>,
    config: WriterConfig,
    index_out: CountingWriter<BufWriter<File>>,
    content_out: CountingWriter<BufWriter<File>>,
    /// Sequence number the next committed record will carry, 1-origin.
    seq: u32,
    /// Newest tag accepted by `write_next`, including a still-pending blob.
    last_tag: Option<i64>,
    /// For each level, the header-suffix offset of the most recent record
    /// whose update height reaches that level.
    back: [i64; MAX_LEVELS],
    back_tag: [i64; MAX_LEVELS],
    pending: Option<PendingBlob>,
}

impl TreeWriter {
    /// Opens a writer with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be created.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with(path, WriterConfig::default())
    }

    /// Opens a writer, creating (or truncating) both store files.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be created.
    pub fn open_with(path: &Path, config: WriterConfig) -> CoreResult<Self> {
        let paths = StorePaths::new(path);
        let lock = lock_for(paths.content());

        let content = File::create(paths.content())?;
        let index = File::create(paths.index())?;

        Ok(Self {
            paths,
            lock,
            config,
            index_out: CountingWriter::new(BufWriter::new(index)),
            content_out: CountingWriter::new(BufWriter::new(content)),
            seq: 1,
            last_tag: None,
            back: [0; MAX_LEVELS],
            back_tag: [0; MAX_LEVELS],
            pending: None,
        })
    }

    /// Begins the next blob, returning a sink for its payload bytes.
    ///
    /// Any previous blob still pending is committed first. The new blob
    /// becomes visible to readers when the sink is closed (or on the next
    /// `write_next` or [`close`](Self::close) if the sink is merely
    /// dropped).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TagOrderViolation`] if `tag` is smaller than the
    /// newest accepted tag; the writer state, including any pending blob, is
    /// left untouched. The first write of a session accepts any tag.
    pub fn write_next(&mut self, tag: i64) -> CoreResult<BlobSink<'_>> {
        if let Some(last) = self.last_tag {
            if tag < last {
                return Err(CoreError::TagOrderViolation {
                    last,
                    attempted: tag,
                });
            }
        }

        self.commit_pending()?;
        self.pending = Some(PendingBlob {
            tag,
            payload: Vec::new(),
        });
        self.last_tag = Some(tag);
        Ok(BlobSink { writer: self })
    }

    /// Commits the pending blob, if any, and releases the file handles.
    ///
    /// # Errors
    ///
    /// Returns an error if the final commit fails.
    pub fn close(mut self) -> CoreResult<()> {
        self.commit_pending()
    }

    /// Discards any pending blob, releases the file handles, and removes
    /// both store files.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be removed.
    pub fn delete(self) -> CoreResult<()> {
        let Self {
            paths,
            index_out,
            content_out,
            ..
        } = self;
        drop(index_out);
        drop(content_out);
        fs::remove_file(paths.index())?;
        fs::remove_file(paths.content())?;
        Ok(())
    }

    /// Appends the pending blob's index record and content record under the
    /// write lock, refreshing the back-pointer state in between.
    fn commit_pending(&mut self) -> CoreResult<()> {
        let Some(blob) = self.pending.take() else {
            return Ok(());
        };
        if blob.payload.len() > i32::MAX as usize {
            return Err(CoreError::BlobTooLarge {
                len: blob.payload.len(),
            });
        }

        let _guard = self.lock.write();

        let seq = self.seq;
        let offset = self.content_out.count();

        let h = height(seq);
        let mut record =
            Vec::with_capacity(h * BACK_POINTER_LEN as usize + 8 + HEADER_SUFFIX_LEN as usize);
        for level in 0..h {
            put_i64(&mut record, self.back_tag[level]);
            put_i64(&mut record, self.back[level]);
        }
        put_i64(&mut record, offset as i64);
        put_i32(&mut record, seq as i32);
        put_i64(&mut record, blob.tag);
        self.index_out.write_all(&record)?;

        let suffix_pos = (self.index_out.count() - HEADER_SUFFIX_LEN) as i64;
        for level in 0..update_height(seq) {
            self.back[level] = suffix_pos;
            self.back_tag[level] = blob.tag;
        }

        let mut len_prefix = Vec::with_capacity(4);
        put_i32(&mut len_prefix, blob.payload.len() as i32);
        self.content_out.write_all(&len_prefix)?;
        self.content_out.write_all(&blob.payload)?;

        // Push both files to the OS before the lock is released; readers use
        // independent descriptors.
        self.index_out.flush()?;
        self.content_out.flush()?;
        if self.config.sync_on_commit {
            self.index_out.get_ref().get_ref().sync_all()?;
            self.content_out.get_ref().get_ref().sync_all()?;
        }

        self.seq += 1;
        Ok(())
    }
}

impl std::fmt::Debug for TreeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWriter")
            .field("path", &self.paths.content())
            .field("seq", &self.seq)
            .field("last_tag", &self.last_tag)
            .field("pending", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}

/// Byte sink for one blob's payload.
///
/// Bytes written here accumulate in memory; nothing reaches disk until
/// [`close`](Self::close) commits the blob. Dropping the sink without
/// closing leaves the blob pending - it commits on the writer's next
/// `write_next` or `close`.
#[derive(Debug)]
pub struct BlobSink<'a> {
    writer: &'a mut TreeWriter,
}

impl BlobSink<'_> {
    /// Commits the blob, making it visible to readers.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub fn close(self) -> CoreResult<()> {
        self.writer.commit_pending()
    }
}

impl Write for BlobSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(pending) = self.writer.pending.as_mut() {
            pending.payload.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::TreeReader;
    use tempfile::tempdir;

    #[test]
    fn open_creates_both_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let writer = TreeWriter::open(&path).unwrap();
        assert!(path.exists());
        assert!(dir.path().join("store.index").exists());
        writer.close().unwrap();
    }

    #[test]
    fn blob_visible_after_sink_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer = TreeWriter::open(&path).unwrap();
        let mut sink = writer.write_next(7).unwrap();
        sink.write_all(b"seven").unwrap();
        sink.close().unwrap();

        let reader = TreeReader::open(&path).unwrap();
        let blob = reader.at(7).unwrap().unwrap();
        assert_eq!(blob.tag(), 7);
        assert_eq!(blob.payload(), b"seven");

        writer.close().unwrap();
    }

    #[test]
    fn open_blob_invisible_until_closed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer = TreeWriter::open(&path).unwrap();
        {
            let mut sink = writer.write_next(1).unwrap();
            sink.write_all(b"partial").unwrap();

            let reader = TreeReader::open(&path).unwrap();
            assert!(reader.at(1).unwrap().is_none());
            assert!(reader.ceil(0).unwrap().is_none());
            assert!(reader.floor(2).unwrap().is_none());

            sink.close().unwrap();
            assert_eq!(reader.at(1).unwrap().unwrap().payload(), b"partial");
            assert_eq!(reader.ceil(0).unwrap().unwrap().tag(), 1);
            assert_eq!(reader.floor(2).unwrap().unwrap().tag(), 1);
        }
        writer.close().unwrap();
    }

    #[test]
    fn dropped_sink_commits_on_next_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer = TreeWriter::open(&path).unwrap();
        {
            let mut sink = writer.write_next(1).unwrap();
            sink.write_all(b"first").unwrap();
            // dropped, not closed
        }

        let reader = TreeReader::open(&path).unwrap();
        assert!(reader.at(1).unwrap().is_none());

        writer.write_next(2).unwrap().close().unwrap();
        assert_eq!(reader.at(1).unwrap().unwrap().payload(), b"first");

        writer.close().unwrap();
    }

    #[test]
    fn close_commits_pending_blob() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer = TreeWriter::open(&path).unwrap();
        let mut sink = writer.write_next(5).unwrap();
        sink.write_all(b"last words").unwrap();
        drop(sink);
        writer.close().unwrap();

        let reader = TreeReader::open(&path).unwrap();
        assert_eq!(reader.at(5).unwrap().unwrap().payload(), b"last words");
    }

    #[test]
    fn rejects_decreasing_tag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer = TreeWriter::open(&path).unwrap();
        writer.write_next(i64::MIN).unwrap().close().unwrap();
        writer.write_next(i64::MAX).unwrap().close().unwrap();

        let err = writer.write_next(0).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TagOrderViolation {
                last: i64::MAX,
                attempted: 0
            }
        ));

        // The writer stays usable at the old watermark.
        writer.write_next(i64::MAX).unwrap().close().unwrap();
        writer.close().unwrap();

        let reader = TreeReader::open(&path).unwrap();
        assert_eq!(reader.range(i64::MIN, i64::MAX).unwrap().len(), 1);
        assert_eq!(reader.at(i64::MAX).unwrap().unwrap().tag(), i64::MAX);
    }

    #[test]
    fn rejected_tag_leaves_pending_blob_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer = TreeWriter::open(&path).unwrap();
        writer.write_next(10).unwrap().close().unwrap();

        let mut sink = writer.write_next(20).unwrap();
        sink.write_all(b"pending").unwrap();
        drop(sink);

        // A pending (uncommitted) tag already bounds the next write.
        assert!(writer.write_next(15).is_err());

        // The pending blob survives the rejection and commits normally.
        writer.write_next(20).unwrap().close().unwrap();
        writer.close().unwrap();

        let reader = TreeReader::open(&path).unwrap();
        let blobs = reader.range(20, 21).unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].payload(), b"pending");
        assert_eq!(blobs[1].payload(), b"");
    }

    #[test]
    fn equal_tags_are_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer = TreeWriter::open(&path).unwrap();
        for payload in [b"a", b"b"] {
            let mut sink = writer.write_next(42).unwrap();
            sink.write_all(payload).unwrap();
            sink.close().unwrap();
        }
        writer.close().unwrap();

        let reader = TreeReader::open(&path).unwrap();
        assert_eq!(reader.range(42, 43).unwrap().len(), 2);
    }

    #[test]
    fn empty_payload_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer = TreeWriter::open(&path).unwrap();
        writer.write_next(3).unwrap().close().unwrap();
        writer.close().unwrap();

        let reader = TreeReader::open(&path).unwrap();
        let blob = reader.at(3).unwrap().unwrap();
        assert_eq!(blob.tag(), 3);
        assert!(blob.payload().is_empty());
    }

    #[test]
    fn delete_removes_both_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer = TreeWriter::open(&path).unwrap();
        writer.write_next(1).unwrap().close().unwrap();
        writer.delete().unwrap();

        assert!(!path.exists());
        assert!(!dir.path().join("store.index").exists());
    }

    #[test]
    fn reopen_truncates_previous_session() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer = TreeWriter::open(&path).unwrap();
        let mut sink = writer.write_next(1).unwrap();
        sink.write_all(b"old").unwrap();
        sink.close().unwrap();
        writer.close().unwrap();

        let writer = TreeWriter::open(&path).unwrap();
        let reader = TreeReader::open(&path).unwrap();
        assert!(reader.at(1).unwrap().is_none());
        assert!(reader.range(i64::MIN, i64::MAX).unwrap().is_empty());
        writer.close().unwrap();
    }

    #[test]
    fn sync_on_commit_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let mut writer =
            TreeWriter::open_with(&path, WriterConfig::new().sync_on_commit(true)).unwrap();
        let mut sink = writer.write_next(9).unwrap();
        sink.write_all(b"durable").unwrap();
        sink.close().unwrap();
        writer.close().unwrap();

        let reader = TreeReader::open(&path).unwrap();
        assert_eq!(reader.at(9).unwrap().unwrap().payload(), b"durable");
    }
}
