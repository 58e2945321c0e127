//! Immutable Snapshot Cell
//!
//! Holds a read-mostly catalog as an `Arc` snapshot. Readers clone the `Arc`
//! and keep a consistent view for as long as they need it; a reload builds a
//! complete replacement and swaps the pointer under the write lock.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

#[derive(Debug)]
pub struct SnapshotCell<T> {
    inner: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(Arc::new(value)),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<T> {
        let guard = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the snapshot, returning the previous one
    pub fn swap(&self, value: T) -> Arc<T> {
        let mut guard = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, Arc::new(value))
    }
}

/// Modification time of a file, if it can be read
pub fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readers_keep_old_snapshot_after_swap() {
        let cell = SnapshotCell::new(vec![1, 2, 3]);
        let before = cell.load();
        let previous = cell.swap(vec![4]);
        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*previous, vec![1, 2, 3]);
        assert_eq!(*cell.load(), vec![4]);
    }

    #[test]
    fn test_concurrent_readers() {
        let cell = Arc::new(SnapshotCell::new(0u64));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cell = Arc::clone(&cell);
                std::thread::spawn(move || {
                    if i == 0 {
                        cell.swap(42);
                    }
                    let v = *cell.load();
                    assert!(v == 0 || v == 42);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*cell.load(), 42);
    }

    #[test]
    fn test_modified_at_missing_file() {
        assert!(modified_at(Path::new("/nonexistent/file.json")).is_none());
    }
}
