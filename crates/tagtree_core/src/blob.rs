//! The blob value type.

use std::fmt;

/// A tagged, opaque byte sequence - the unit of storage.
///
/// Two blobs are equal when both their tag and their payload bytes are equal.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    tag: i64,
    payload: Vec<u8>,
}

impl Blob {
    /// Creates a blob from a tag and its payload bytes.
    #[must_use]
    pub fn new(tag: i64, payload: Vec<u8>) -> Self {
        Self { tag, payload }
    }

    /// The tag this blob was written under.
    #[must_use]
    pub fn tag(&self) -> i64 {
        self.tag
    }

    /// The payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the blob, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("tag", &self.tag)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
