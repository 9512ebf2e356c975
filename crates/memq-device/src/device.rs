//! Device trait and the host reference implementation
//!
//! A device owns shared-buffer storage and answers capability queries. The
//! engine talks to it exclusively through the [`Device`] trait so that real
//! accelerator devices can be slotted in behind the same surface.

use crate::error::{DeviceError, Result};
use crate::region::SharedRegion;
use crate::types::BufferHandle;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Device interface for shared-memory buffer management
///
/// # Memory Model
///
/// Buffers allocated here are *shared*: the storage returned by [`region`]
/// is addressable by the host and by asynchronous executors without copies.
/// A device that cannot provide that reports `supports_shared_memory() ==
/// false`, and callers are expected to skip shared-memory workloads rather
/// than fail them.
///
/// [`region`]: Device::region
pub trait Device: Send + Sync {
    /// Human-readable device name, for logs.
    fn name(&self) -> &str;

    /// Whether buffers are addressable by host and executor without copy.
    fn supports_shared_memory(&self) -> bool;

    /// Allocate a shared buffer of `size` bytes.
    ///
    /// Initial contents are unspecified at the trait level (the host device
    /// zero-fills, but callers must not rely on it).
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::AllocationFailed`] when the device cannot
    /// satisfy the request, and [`DeviceError::Unsupported`] when the device
    /// has no shared memory at all.
    fn allocate(&self, size: usize) -> Result<BufferHandle>;

    /// Free a previously allocated buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidBufferHandle`] if the handle was never
    /// allocated or was already freed.
    fn free(&self, handle: BufferHandle) -> Result<()>;

    /// Get the shared region behind a handle.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidBufferHandle`] for unknown handles.
    fn region(&self, handle: BufferHandle) -> Result<SharedRegion>;

    /// Get buffer size in bytes.
    fn buffer_size(&self, handle: BufferHandle) -> Result<usize> {
        Ok(self.region(handle)?.len())
    }
}

/// Reference device backed by process memory
///
/// Keeps a handle map with monotonically increasing IDs. An optional
/// capacity cap makes allocation failure reachable in tests; the default is
/// uncapped.
pub struct HostDevice {
    regions: RwLock<Registry>,
    capacity: usize,
    shared_memory: bool,
}

struct Registry {
    regions: HashMap<u64, SharedRegion>,
    next_id: u64,
    allocated: usize,
}

impl HostDevice {
    /// Create a host device with shared-memory support and no capacity cap.
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    /// Create a host device that refuses allocations once the total
    /// outstanding size would exceed `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            regions: RwLock::new(Registry {
                regions: HashMap::new(),
                next_id: 1,
                allocated: 0,
            }),
            capacity,
            shared_memory: true,
        }
    }

    /// Capability-probe double: a host device reporting no shared-memory
    /// support. Allocation on it fails with [`DeviceError::Unsupported`].
    pub fn without_shared_memory() -> Self {
        Self {
            shared_memory: false,
            ..Self::new()
        }
    }

    /// Number of live (allocated, not yet freed) buffers.
    pub fn live_buffers(&self) -> usize {
        self.regions.read().regions.len()
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn supports_shared_memory(&self) -> bool {
        self.shared_memory
    }

    fn allocate(&self, size: usize) -> Result<BufferHandle> {
        if !self.shared_memory {
            return Err(DeviceError::Unsupported(
                "device has no shared-memory allocations".to_string(),
            ));
        }

        let mut registry = self.regions.write();
        if registry.allocated.saturating_add(size) > self.capacity {
            return Err(DeviceError::AllocationFailed {
                requested: size,
                capacity: self.capacity,
            });
        }

        let id = registry.next_id;
        registry.next_id += 1;
        registry.allocated += size;
        registry.regions.insert(id, SharedRegion::new(size));

        tracing::trace!(handle = id, size, "host allocate");
        Ok(BufferHandle::new(id))
    }

    fn free(&self, handle: BufferHandle) -> Result<()> {
        let mut registry = self.regions.write();
        match registry.regions.remove(&handle.id()) {
            Some(region) => {
                registry.allocated -= region.len();
                tracing::trace!(handle = handle.id(), size = region.len(), "host free");
                Ok(())
            }
            None => Err(DeviceError::InvalidBufferHandle(handle.id())),
        }
    }

    fn region(&self, handle: BufferHandle) -> Result<SharedRegion> {
        self.regions
            .read()
            .regions
            .get(&handle.id())
            .cloned()
            .ok_or(DeviceError::InvalidBufferHandle(handle.id()))
    }
}
