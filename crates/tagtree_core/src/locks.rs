//! Process-wide registry of per-store read/write locks.
//!
//! Every reader and writer constructed for the same base path must share one
//! lock, otherwise a reader could observe a half-written index record. The
//! registry keys locks by the content path exactly as given; callers must
//! name a store by the same path spelling everywhere.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

type Registry = Mutex<HashMap<PathBuf, Weak<RwLock<()>>>>;

static LOCKS: OnceLock<Registry> = OnceLock::new();

/// Returns the shared read/write lock for the store at `path`, creating it
/// on first use.
///
/// Entries are held weakly: once every reader and writer of a path is gone,
/// the lock is dropped, and dead entries are pruned whenever a new lock is
/// registered.
pub(crate) fn lock_for(path: &Path) -> Arc<RwLock<()>> {
    let registry = LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = registry.lock();

    if let Some(existing) = map.get(path).and_then(Weak::upgrade) {
        return existing;
    }

    let lock = Arc::new(RwLock::new(()));
    map.retain(|_, weak| weak.strong_count() > 0);
    map.insert(path.to_path_buf(), Arc::downgrade(&lock));
    lock
}
