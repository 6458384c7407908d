//! Resolution of the content/index file pair.

use std::path::{Path, PathBuf};

/// The two files making up one store.
///
/// The content file lives at the base path itself; the index file sits next
/// to it with `.index` appended to the full file name (`events` pairs with
/// `events.index`, `events.dat` with `events.dat.index`).
#[derive(Debug, Clone)]
pub(crate) struct StorePaths {
    content: PathBuf,
    index: PathBuf,
}

impl StorePaths {
    /// Resolves the file pair for the store at `content`.
    pub(crate) fn new(content: &Path) -> Self {
        let mut index = content.as_os_str().to_os_string();
        index.push(".index");
        Self {
            content: content.to_path_buf(),
            index: PathBuf::from(index),
        }
    }

    /// Path of the content file (the base path).
    pub(crate) fn content(&self) -> &Path {
        &self.content
    }

    /// Path of the index file.
    pub(crate) fn index(&self) -> &Path {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_appends_to_file_name() {
        let paths = StorePaths::new(Path::new("store/events"));
        assert_eq!(paths.content(), Path::new("store/events"));
        assert_eq!(paths.index(), Path::new("store/events.index"));
    }

    #[test]
    fn extension_is_kept() {
        let paths = StorePaths::new(Path::new("events.dat"));
        assert_eq!(paths.index(), Path::new("events.dat.index"));
    }
}
