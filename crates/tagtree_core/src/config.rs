//! Writer configuration.

/// Configuration for a [`crate::TreeWriter`].
#[derive(Debug, Clone, Default)]
pub struct WriterConfig {
    /// Whether to fsync both files after each commit (safer but slower).
    ///
    /// Committed bytes are always flushed to the OS so concurrent readers
    /// observe them; this flag additionally forces them to disk.
    pub sync_on_commit: bool,
}

impl WriterConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to fsync after every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}
