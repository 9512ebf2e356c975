//! End-to-end behavior of the command engine on the host device.

use memq_core::{fill_byteset_copy, CommandQueue, Error, EventState, Outcome, ScopedBuffer};
use memq_device::{BufferHandle, Device, HostDevice, SharedRegion};
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Once};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // A subscriber may already be installed by another harness.
        let _ = memq_tracing::init_global_tracing(&memq_tracing::TracingConfig::for_ci());
    });
}

fn host_queue() -> CommandQueue {
    init_tracing();
    CommandQueue::new(Arc::new(HostDevice::new()))
}

#[test]
fn test_reference_workload_passes() {
    init_tracing();
    let outcome = fill_byteset_copy(Arc::new(HostDevice::new())).unwrap();
    assert!(outcome.is_pass(), "unexpected outcome: {outcome:?}");
}

#[test]
fn test_reference_workload_skips_without_capability() {
    init_tracing();
    let outcome = fill_byteset_copy(Arc::new(HostDevice::without_shared_memory())).unwrap();
    match outcome {
        Outcome::Skipped(reason) => assert!(reason.contains("shared memory")),
        other => panic!("expected skip, got {other:?}"),
    }
}

#[test]
fn test_chain_post_state_byte_for_byte() {
    let queue = host_queue();
    let input = queue.allocate::<i32>(2).unwrap();
    let output = queue.allocate::<i32>(2).unwrap();

    let filled = queue.fill(&input, 1i32, 2, &[]).unwrap();
    let set = queue.byte_set(&input, 10, 4, &[filled]).unwrap();
    let copied = queue.byte_copy(&output, &input, 8, &[set]).unwrap();
    queue.wait_all(&[copied]).unwrap();

    let observed = output.to_vec(&queue).unwrap();
    assert_eq!(observed[0], i32::from_ne_bytes([10, 10, 10, 10]));
    assert_eq!(observed[1], 1);

    queue.free(input).unwrap();
    queue.free(output).unwrap();
}

#[test]
fn test_independent_commands_all_complete() {
    let queue = host_queue();

    let buffers: Vec<_> = (0..32)
        .map(|_| queue.allocate::<u8>(64).unwrap())
        .collect();
    let events: Vec<_> = buffers
        .iter()
        .enumerate()
        .map(|(i, buffer)| queue.byte_set(buffer, i as u8, 64, &[]).unwrap())
        .collect();
    queue.wait_all(&events).unwrap();

    for (i, buffer) in buffers.iter().enumerate() {
        assert_eq!(buffer.to_vec(&queue).unwrap(), vec![i as u8; 64]);
    }
    for buffer in buffers {
        queue.free(buffer).unwrap();
    }
}

#[test]
fn test_long_chain_is_sequenced() {
    let queue = host_queue();
    let buffer = queue.allocate::<u8>(16).unwrap();

    // Each link overwrites the whole buffer; only the last value survives.
    let mut last = queue.byte_set(&buffer, 0, 16, &[]).unwrap();
    for value in 1..=100u8 {
        last = queue.byte_set(&buffer, value, 16, &[last]).unwrap();
    }
    queue.wait_all(&[last]).unwrap();

    assert_eq!(buffer.to_vec(&queue).unwrap(), vec![100u8; 16]);
    queue.free(buffer).unwrap();
}

#[test]
fn test_wait_all_covers_transitive_dependencies() {
    let queue = host_queue();
    let buffer = queue.allocate::<u8>(8).unwrap();

    let a = queue.byte_set(&buffer, 1, 8, &[]).unwrap();
    let b = queue.byte_set(&buffer, 2, 8, &[a.clone()]).unwrap();
    let c = queue.byte_set(&buffer, 3, 8, &[b.clone()]).unwrap();

    // Waiting on the tip alone must still cover the whole chain.
    queue.wait_all(&[c.clone()]).unwrap();
    assert_eq!(a.state(), EventState::Completed);
    assert_eq!(b.state(), EventState::Completed);
    assert_eq!(c.state(), EventState::Completed);

    queue.free(buffer).unwrap();
}

#[test]
fn test_allocation_failure_surfaces() {
    init_tracing();
    let queue = CommandQueue::new(Arc::new(HostDevice::with_capacity(16)));

    let ok = queue.allocate::<u8>(16).unwrap();
    assert!(matches!(
        queue.allocate::<u8>(1),
        Err(Error::Allocation { requested: 1 })
    ));
    queue.free(ok).unwrap();
}

#[test]
fn test_scoped_buffer_frees_on_drop() {
    init_tracing();
    let device = Arc::new(HostDevice::new());
    let queue = CommandQueue::new(device.clone());

    {
        let scoped = ScopedBuffer::new(&queue, queue.allocate::<i32>(4).unwrap());
        let event = queue.fill(scoped.buffer(), 3i32, 4, &[]).unwrap();
        queue.wait_all(&[event]).unwrap();
        assert_eq!(device.live_buffers(), 1);
    }
    assert_eq!(device.live_buffers(), 0);
}

/// Host device whose `region` lookups block until released, so a test can
/// hold a command in `Running` deterministically.
struct GateDevice {
    inner: HostDevice,
    open: Mutex<bool>,
    opened: Condvar,
    entered: Mutex<usize>,
    entered_cond: Condvar,
}

impl GateDevice {
    fn new() -> Self {
        Self {
            inner: HostDevice::new(),
            open: Mutex::new(false),
            opened: Condvar::new(),
            entered: Mutex::new(0),
            entered_cond: Condvar::new(),
        }
    }

    /// Block until at least one worker is inside `region`.
    fn wait_entered(&self) {
        let mut entered = self.entered.lock();
        while *entered == 0 {
            self.entered_cond.wait(&mut entered);
        }
    }

    fn open_gate(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.opened.notify_all();
    }
}

impl Device for GateDevice {
    fn name(&self) -> &str {
        "gate"
    }

    fn supports_shared_memory(&self) -> bool {
        true
    }

    fn allocate(&self, size: usize) -> memq_device::Result<BufferHandle> {
        self.inner.allocate(size)
    }

    fn free(&self, handle: BufferHandle) -> memq_device::Result<()> {
        self.inner.free(handle)
    }

    fn region(&self, handle: BufferHandle) -> memq_device::Result<SharedRegion> {
        {
            let mut entered = self.entered.lock();
            *entered += 1;
            self.entered_cond.notify_all();
        }
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
        self.inner.region(handle)
    }

    // Submission-time existence checks must not block on the gate.
    fn buffer_size(&self, handle: BufferHandle) -> memq_device::Result<usize> {
        Ok(self.inner.region(handle)?.len())
    }
}

#[test]
fn test_free_rejected_while_command_in_flight() {
    init_tracing();
    let device = Arc::new(GateDevice::new());
    let queue = CommandQueue::new(device.clone());
    let buffer = queue.allocate::<u8>(8).unwrap();

    let event = queue.byte_set(&buffer, 7, 8, &[]).unwrap();
    device.wait_entered();

    // The command is mid-execution, so the buffer cannot be released.
    let err = queue.free(buffer.clone()).unwrap_err();
    assert!(matches!(err, Error::UseAfterFree(_)));

    device.open_gate();
    queue.wait_all(&[event]).unwrap();

    // Terminal command, release now succeeds.
    queue.free(buffer).unwrap();
    assert_eq!(queue.in_flight_buffers(), 0);
}

#[test]
fn test_failure_propagates_through_fan_out() {
    let queue = host_queue();
    let buffer = queue.allocate::<u8>(4).unwrap();

    let bad = queue.byte_set(&buffer, 0, 100, &[]).unwrap();
    let children: Vec<_> = (0..8)
        .map(|_| queue.byte_set(&buffer, 1, 4, &[bad.clone()]).unwrap())
        .collect();

    let err = queue.wait_all(&children).unwrap_err();
    assert!(matches!(err, Error::OutOfBounds { .. }));
    for child in &children {
        assert_eq!(child.state(), EventState::Failed);
        assert!(matches!(
            child.failure_cause(),
            Some(Error::OutOfBounds { .. })
        ));
    }

    // Failed commands still release their buffer references.
    queue.free(buffer).unwrap();
}
