//! Typed buffer handles over shared memory
//!
//! A [`Buffer`] is a lightweight typed view of a device allocation: a handle
//! plus an element count. It holds no storage itself; all access goes through
//! the [`CommandQueue`](crate::CommandQueue) that allocated it, and freeing
//! is explicit (or scoped, via [`ScopedBuffer`]).

use crate::error::Result;
use crate::queue::CommandQueue;
use bytemuck::Pod;
use memq_device::BufferHandle;
use std::marker::PhantomData;

/// Typed handle to a device allocation of `len` elements of `T`
pub struct Buffer<T: Pod> {
    handle: BufferHandle,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> Buffer<T> {
    pub(crate) fn new(handle: BufferHandle, len: usize) -> Self {
        Self {
            handle,
            len,
            _marker: PhantomData,
        }
    }

    /// Underlying device handle.
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds zero elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocation size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// Read the full contents back to host memory.
    ///
    /// Synchronous with respect to already-completed commands only; callers
    /// reach the join point first when ordering matters.
    pub fn to_vec(&self, queue: &CommandQueue) -> Result<Vec<T>> {
        queue.read(self)
    }

    /// Overwrite the buffer prefix with `data`, synchronously.
    pub fn copy_from_slice(&self, queue: &CommandQueue, data: &[T]) -> Result<()> {
        queue.write_slice(self, data)
    }
}

impl<T: Pod> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle,
            len: self.len,
            _marker: PhantomData,
        }
    }
}

impl<T: Pod> std::fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("len", &self.len)
            .field("element_size", &std::mem::size_of::<T>())
            .finish()
    }
}

/// A buffer freed automatically when dropped
///
/// Borrows the queue for its lifetime so the release cannot outlive it. A
/// failed release on drop (outstanding commands still running) is logged
/// rather than panicked; explicit [`free`](ScopedBuffer::free) returns the
/// error instead.
pub struct ScopedBuffer<'q, T: Pod> {
    queue: &'q CommandQueue,
    buffer: Option<Buffer<T>>,
}

impl<'q, T: Pod> ScopedBuffer<'q, T> {
    pub fn new(queue: &'q CommandQueue, buffer: Buffer<T>) -> Self {
        Self {
            queue,
            buffer: Some(buffer),
        }
    }

    /// The wrapped buffer.
    pub fn buffer(&self) -> &Buffer<T> {
        self.buffer
            .as_ref()
            .unwrap_or_else(|| unreachable!("buffer taken only in free/drop"))
    }

    /// Release the allocation now, surfacing any error.
    pub fn free(mut self) -> Result<()> {
        match self.buffer.take() {
            Some(buffer) => self.queue.free(buffer),
            None => Ok(()),
        }
    }
}

impl<T: Pod> Drop for ScopedBuffer<'_, T> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            let handle = buffer.handle();
            if let Err(err) = self.queue.free(buffer) {
                tracing::warn!(%handle, error = %err, "scoped buffer release failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_sizing() {
        let buffer: Buffer<i32> = Buffer::new(BufferHandle::new(1), 2);
        assert_eq!(buffer.len(), 2);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.size_bytes(), 8);

        let clone = buffer.clone();
        assert_eq!(clone.handle(), buffer.handle());
    }
}
