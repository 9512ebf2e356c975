//! Error types for device operations

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors that can occur at the device boundary
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    /// Invalid or already-freed buffer handle
    #[error("invalid buffer handle: {0}")]
    InvalidBufferHandle(u64),

    /// Allocation failed
    #[error("allocation failed: requested {requested} bytes, capacity {capacity} bytes")]
    AllocationFailed { requested: usize, capacity: usize },

    /// Buffer access out of bounds
    #[error("buffer access out of bounds: offset {offset} + len {len} > buffer size {buffer_size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_size: usize,
    },

    /// Operation requires a capability the device does not have
    #[error("unsupported on this device: {0}")]
    Unsupported(String),
}
