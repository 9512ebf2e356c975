//! Shared memory regions
//!
//! A [`SharedRegion`] is the storage behind a buffer handle. It is reference
//! counted and lock protected so that the submitting thread and the
//! asynchronous executors address the same bytes without any copy: the
//! region handed to a worker is the region the host reads back.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Reference-counted, lock-protected byte storage shared between the host
/// and the asynchronous executors.
///
/// Cloning a `SharedRegion` clones the reference, not the bytes. The region
/// stays alive while any clone exists, so a command that captured a region
/// before the buffer was freed still operates on valid storage; handle-level
/// validity is enforced by the device and the engine's outstanding-command
/// accounting, not by this type.
#[derive(Debug, Clone)]
pub struct SharedRegion {
    bytes: Arc<RwLock<Box<[u8]>>>,
    len: usize,
}

impl SharedRegion {
    /// Create a zero-initialized region of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(vec![0u8; len].into_boxed_slice())),
            len,
        }
    }

    /// Region length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the region is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Acquire shared read access to the bytes.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.bytes.read()
    }

    /// Acquire exclusive write access to the bytes.
    ///
    /// The engine serializes writes only through declared dependency edges;
    /// this lock guarantees memory safety for commands the caller chose to
    /// leave unordered, not any particular interleaving.
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.bytes.write()
    }

    /// Whether two regions are backed by the same storage.
    pub fn same_storage(&self, other: &SharedRegion) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_zero_initialized() {
        let region = SharedRegion::new(16);
        assert_eq!(region.len(), 16);
        assert!(region.read().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_region_clone_shares_storage() {
        let region = SharedRegion::new(8);
        let alias = region.clone();
        assert!(region.same_storage(&alias));

        alias.write()[3] = 0xAB;
        assert_eq!(region.read()[3], 0xAB);
    }

    #[test]
    fn test_region_empty() {
        let region = SharedRegion::new(0);
        assert!(region.is_empty());
    }
}
