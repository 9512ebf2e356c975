//! Reference workload: fill, byte-set, byte-copy
//!
//! A three-command chain over two shared 2-element `i32` buffers that
//! exercises every primitive and both replication units. The chain is
//! strictly ordered by events, verified against a host-side model, and
//! skipped cleanly on devices without shared memory.
//!
//! The expected post-state is the part worth reading twice: the byte-set
//! covers exactly one element with the byte `10`, so the first output
//! element is the integer formed from the bytes `[10, 10, 10, 10]`, while
//! the second keeps the fill value `1`.

use crate::buffer::ScopedBuffer;
use crate::error::Result;
use crate::queue::CommandQueue;
use crate::verify::{compare_elements, BufferModel, VerificationReport};
use memq_device::Device;
use std::sync::Arc;

/// Elements per buffer in the reference workload.
pub const ELEMENT_COUNT: usize = 2;
/// Element value written by the fill.
pub const FILL_VALUE: i32 = 1;
/// Byte value written by the byte-set over the first element.
pub const OVERWRITE_BYTE: u8 = 10;

/// How a workload run ended
#[derive(Debug)]
pub enum Outcome {
    /// Ran to completion and the output matched the model
    Passed,
    /// Ran to completion but the output differed
    Failed(VerificationReport),
    /// Not run; the device lacks a required capability
    Skipped(String),
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

/// Run the fill/byte-set/byte-copy chain on `device` and verify the output.
///
/// Returns `Skipped` before allocating anything if the device does not
/// expose shared memory. Execution or allocation errors propagate as `Err`;
/// a clean run with wrong contents is `Ok(Failed(..))`.
#[tracing::instrument(skip(device), fields(device = device.name()))]
pub fn fill_byteset_copy(device: Arc<dyn Device>) -> Result<Outcome> {
    if !device.supports_shared_memory() {
        let reason = format!("device '{}' lacks shared memory", device.name());
        tracing::info!(reason = %reason, "workload skipped");
        return Ok(Outcome::Skipped(reason));
    }

    let element_size = std::mem::size_of::<i32>();
    let byte_count = ELEMENT_COUNT * element_size;

    let queue = CommandQueue::new(device);
    // Scoped so an early return from any fallible step still releases the
    // allocations.
    let input = ScopedBuffer::new(&queue, queue.allocate::<i32>(ELEMENT_COUNT)?);
    let output = ScopedBuffer::new(&queue, queue.allocate::<i32>(ELEMENT_COUNT)?);

    let filled = queue.fill(input.buffer(), FILL_VALUE, ELEMENT_COUNT, &[])?;
    let overwritten = queue.byte_set(input.buffer(), OVERWRITE_BYTE, element_size, &[filled])?;
    let copied = queue.byte_copy(output.buffer(), input.buffer(), byte_count, &[overwritten])?;
    queue.wait_all(&[copied])?;

    let mut input_model = BufferModel::new(byte_count);
    input_model.fill(FILL_VALUE, ELEMENT_COUNT)?;
    input_model.byte_set(OVERWRITE_BYTE, element_size)?;
    let mut output_model = BufferModel::new(byte_count);
    output_model.byte_copy_from(&input_model, byte_count)?;

    let expected: Vec<i32> = output_model.elements();
    let actual = output.buffer().to_vec(&queue)?;
    let report = compare_elements(&expected, &actual);

    input.free()?;
    output.free()?;

    if report.is_pass() {
        tracing::info!("workload passed");
        Ok(Outcome::Passed)
    } else {
        tracing::warn!(%report, "workload failed verification");
        Ok(Outcome::Failed(report))
    }
}
