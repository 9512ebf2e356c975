//! Error types for engine operations

use memq_device::DeviceError;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the command engine
///
/// Per-command errors are recorded on the command's [`Event`](crate::Event)
/// rather than thrown across the asynchronous boundary; they surface when a
/// caller reaches the join point via
/// [`CommandQueue::wait_all`](crate::CommandQueue::wait_all).
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Buffer allocation failed
    #[error("allocation failed: requested {requested} bytes")]
    Allocation { requested: usize },

    /// Requested span exceeds the target buffer
    #[error("access out of bounds: offset {offset} + len {len} > buffer size {buffer_size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_size: usize,
    },

    /// Element-level operation on a buffer that is not a whole number of elements
    #[error(
        "misaligned element operation: buffer of {byte_len} bytes is not a whole \
         number of {element_size}-byte elements"
    )]
    InvalidAlignment { byte_len: usize, element_size: usize },

    /// Buffer referenced outside its allocate/free window
    #[error("use after free: buffer {0} referenced outside its allocate/free window")]
    UseAfterFree(u64),

    /// Declared dependency graph contains a cycle
    #[error("dependency graph contains a cycle")]
    CyclicDependency,

    /// Command execution failed
    #[error("execution failed: {0}")]
    ExecutionFailure(String),

    /// Buffer contents did not match the expected post-state
    #[error("verification mismatch at element {location}: expected {expected}, actual {actual}")]
    VerificationMismatch {
        location: usize,
        expected: String,
        actual: String,
    },
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::InvalidBufferHandle(id) => Error::UseAfterFree(id),
            DeviceError::AllocationFailed { requested, .. } => Error::Allocation { requested },
            DeviceError::OutOfBounds {
                offset,
                len,
                buffer_size,
            } => Error::OutOfBounds {
                offset,
                len,
                buffer_size,
            },
            DeviceError::Unsupported(msg) => Error::ExecutionFailure(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_conversion() {
        let err: Error = DeviceError::InvalidBufferHandle(7).into();
        assert!(matches!(err, Error::UseAfterFree(7)));

        let err: Error = DeviceError::AllocationFailed {
            requested: 64,
            capacity: 32,
        }
        .into();
        assert!(matches!(err, Error::Allocation { requested: 64 }));
    }
}
