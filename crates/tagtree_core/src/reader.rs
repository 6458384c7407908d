//! The search side of a store.

use crate::blob::Blob;
use crate::codec::{i32_at, i64_at};
use crate::error::{CoreError, CoreResult};
use crate::layout::{height, record_len, BACK_POINTER_LEN, HEADER_SUFFIX_LEN};
use crate::locks::lock_for;
use crate::paths::StorePaths;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tagtree_storage::ReadOnlyFile;

/// How a search resolves when no exact tag match exists.
#[derive(Clone, Copy)]
enum SeekPolicy {
    /// Exact tag only.
    Match,
    /// Largest tag less than or equal to the query.
    Floor,
    /// Smallest tag greater than or equal to the query.
    Ceil,
}

/// Searches a store by tag.
///
/// A reader holds its own read-only handles on the two store files and
/// shares the per-path lock with any writer, so every operation observes a
/// consistent prefix of committed records - never a half-written one. Any
/// number of readers may work on the same path concurrently, including
/// while a writer is live.
///
/// Lookups descend the skip-list back pointers from the newest record, so a
/// point query costs O(log N) positioned reads regardless of store size.
#[derive(Debug)]
pub struct TreeReader {
    lock: Arc<RwLock<()>>,
    idx: ReadOnlyFile,
    body: ReadOnlyFile,
}

impl TreeReader {
    /// Opens a reader on the store at `path`.
    ///
    /// The index may be empty (every lookup resolves to nothing), but both
    /// files must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be opened.
    pub fn open(path: &Path) -> CoreResult<Self> {
        let paths = StorePaths::new(path);
        let lock = lock_for(paths.content());
        let body = ReadOnlyFile::open(paths.content())?;
        let idx = ReadOnlyFile::open(paths.index())?;
        Ok(Self { lock, idx, body })
    }

    /// Returns the blob with exactly the given tag, if any.
    ///
    /// With duplicate tags, which of them is returned is unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptIndex`] if the index is malformed, or an
    /// I/O error with its cause.
    pub fn at(&self, tag: i64) -> CoreResult<Option<Blob>> {
        self.read(tag, SeekPolicy::Match)
    }

    /// Returns the blob with the largest tag `<= tag`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptIndex`] if the index is malformed, or an
    /// I/O error with its cause.
    pub fn floor(&self, tag: i64) -> CoreResult<Option<Blob>> {
        self.read(tag, SeekPolicy::Floor)
    }

    /// Returns the blob with the smallest tag `>= tag`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptIndex`] if the index is malformed, or an
    /// I/O error with its cause.
    pub fn ceil(&self, tag: i64) -> CoreResult<Option<Blob>> {
        self.read(tag, SeekPolicy::Ceil)
    }

    /// Returns all blobs whose tag lies in `[start, end)`, in ascending tag
    /// order (write order among duplicates). Can be empty, never an error,
    /// when nothing falls in the range.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptIndex`] if the index is malformed, or an
    /// I/O error with its cause.
    pub fn range(&self, start: i64, end: i64) -> CoreResult<Vec<Blob>> {
        let _guard = self.lock.read();

        if start >= end {
            return Ok(Vec::new());
        }
        let Some(mut cursor) = self.descend(start, SeekPolicy::Ceil)? else {
            return Ok(Vec::new());
        };
        if cursor.tag() >= end {
            return Ok(Vec::new());
        }

        let mut blobs = Vec::new();
        loop {
            blobs.push(cursor.blob(&self.body)?);

            // Consecutive header suffixes are separated by exactly the size
            // of the later record.
            let next_pos = cursor.pos + record_len(cursor.seq() + 1);
            if next_pos + HEADER_SUFFIX_LEN > cursor.idx_len {
                break;
            }
            cursor.seek(next_pos)?;
            if cursor.tag() >= end {
                break;
            }
        }
        Ok(blobs)
    }

    fn read(&self, tag: i64, policy: SeekPolicy) -> CoreResult<Option<Blob>> {
        let _guard = self.lock.read();
        match self.descend(tag, policy)? {
            Some(cursor) => Ok(Some(cursor.blob(&self.body)?)),
            None => Ok(None),
        }
    }

    /// Skip-list descent from the tail of the index.
    ///
    /// Positions a cursor on the record resolving `tag` under `policy`, or
    /// `None`. For `Ceil` the descent walks past exact matches, landing on
    /// the *earliest* record whose tag reaches the target, so a range scan
    /// starting there sees every duplicate.
    fn descend(&self, tag: i64, policy: SeekPolicy) -> CoreResult<Option<Cursor<'_>>> {
        let idx_len = self.idx.len()?;
        if idx_len == 0 {
            return Ok(None);
        }
        if idx_len < record_len(1) {
            return Err(CoreError::corrupt_index(format!(
                "index length {idx_len} is shorter than one record"
            )));
        }

        let mut cursor = Cursor::new(&self.idx, idx_len);
        cursor.seek(idx_len - HEADER_SUFFIX_LEN)?;

        loop {
            let t = cursor.tag();
            if t < tag {
                // Everything from here back is smaller; only a floor search
                // has an answer.
                return Ok(match policy {
                    SeekPolicy::Floor => Some(cursor),
                    _ => None,
                });
            }
            if t == tag && !matches!(policy, SeekPolicy::Ceil) {
                return Ok(Some(cursor));
            }

            let h = cursor.height();
            if h == 0 {
                // The first record; nothing earlier exists.
                return Ok(match policy {
                    SeekPolicy::Ceil => Some(cursor),
                    _ => None,
                });
            }

            let span = h as u64 * BACK_POINTER_LEN;
            if cursor.pos < span + 8 {
                return Err(CoreError::corrupt_index(format!(
                    "record at offset {} cannot hold {h} back pointers",
                    cursor.pos
                )));
            }
            let back = self.idx.read_at(cursor.pos - 8 - span, span as usize)?;

            // Jump along the highest level that does not overshoot the
            // target; the stored tags spare us reading intermediate records.
            let mut jumped = false;
            for level in (0..h).rev() {
                let bp_tag = i64_at(&back, level * BACK_POINTER_LEN as usize);
                if bp_tag >= tag {
                    let bp_off = i64_at(&back, level * BACK_POINTER_LEN as usize + 8);
                    cursor.seek_back(bp_off)?;
                    jumped = true;
                    break;
                }
            }
            if jumped {
                continue;
            }

            // Every back pointer precedes the target: the tag falls strictly
            // between the level-0 neighbour and this record.
            return match policy {
                SeekPolicy::Match => Ok(None),
                SeekPolicy::Ceil => Ok(Some(cursor)),
                SeekPolicy::Floor => {
                    let bp_off = i64_at(&back, 8);
                    cursor.seek_back(bp_off)?;
                    Ok(Some(cursor))
                }
            };
        }
    }
}

/// A position in the index file with the 12-byte header suffix at that
/// position cached.
struct Cursor<'a> {
    idx: &'a ReadOnlyFile,
    /// Index length snapshotted at the start of the operation; constant
    /// while the read lock is held.
    idx_len: u64,
    pos: u64,
    buf: [u8; HEADER_SUFFIX_LEN as usize],
}

impl<'a> Cursor<'a> {
    fn new(idx: &'a ReadOnlyFile, idx_len: u64) -> Self {
        Self {
            idx,
            idx_len,
            pos: 0,
            buf: [0; HEADER_SUFFIX_LEN as usize],
        }
    }

    /// Moves to the header suffix at `pos` and caches it.
    fn seek(&mut self, pos: u64) -> CoreResult<()> {
        if pos + HEADER_SUFFIX_LEN > self.idx_len {
            return Err(CoreError::corrupt_index(format!(
                "record position {pos} past index end {}",
                self.idx_len
            )));
        }
        let bytes = self.idx.read_at(pos, HEADER_SUFFIX_LEN as usize)?;
        self.buf.copy_from_slice(&bytes);
        self.pos = pos;

        let seq = i32_at(&self.buf, 0);
        if seq < 1 {
            return Err(CoreError::corrupt_index(format!(
                "sequence number {seq} at offset {pos}"
            )));
        }
        Ok(())
    }

    /// Follows a back-pointer offset, which must land strictly before the
    /// current position.
    fn seek_back(&mut self, offset: i64) -> CoreResult<()> {
        if offset < 0 || offset as u64 >= self.pos {
            return Err(CoreError::corrupt_index(format!(
                "back pointer to offset {offset} from record at {}",
                self.pos
            )));
        }
        self.seek(offset as u64)
    }

    fn seq(&self) -> u32 {
        i32_at(&self.buf, 0) as u32
    }

    fn tag(&self) -> i64 {
        i64_at(&self.buf, 4)
    }

    fn height(&self) -> usize {
        height(self.seq())
    }

    /// Reads the blob this record points at: the payload offset sits
    /// immediately before the header suffix, the length-prefixed payload at
    /// that offset in the content file.
    fn blob(&self, body: &ReadOnlyFile) -> CoreResult<Blob> {
        if self.pos < 8 {
            return Err(CoreError::corrupt_index(format!(
                "record position {} cannot hold a payload offset",
                self.pos
            )));
        }
        let offset_bytes = self.idx.read_at(self.pos - 8, 8)?;
        let payload_offset = i64_at(&offset_bytes, 0);

        let body_len = body.len()?;
        if payload_offset < 0 || payload_offset as u64 + 4 > body_len {
            return Err(CoreError::corrupt_index(format!(
                "payload offset {payload_offset} outside content file of {body_len} bytes"
            )));
        }

        let len_bytes = body.read_at(payload_offset as u64, 4)?;
        let len = i32_at(&len_bytes, 0);
        if len < 0 || payload_offset as u64 + 4 + len as u64 > body_len {
            return Err(CoreError::corrupt_index(format!(
                "payload length {len} at offset {payload_offset} outside content file of {body_len} bytes"
            )));
        }

        let payload = body.read_at(payload_offset as u64 + 4, len as usize)?;
        Ok(Blob::new(self.tag(), payload))
    }
}
