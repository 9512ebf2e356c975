//! Handle types for device-managed resources

use std::fmt;

/// Handle to an allocated shared buffer
///
/// Buffers are opaque handles managed by the device.
/// Use [`Device`](crate::Device) methods to interact with buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

impl BufferHandle {
    /// Create a new buffer handle
    pub const fn new(id: u64) -> Self {
        BufferHandle(id)
    }

    /// Get the internal ID
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_handle() {
        let handle = BufferHandle::new(42);
        assert_eq!(handle.id(), 42);
        assert_eq!(handle.to_string(), "buf42");
    }
}
