//! Command queue and dependency-ordered scheduler
//!
//! The queue accepts commands with explicit event dependencies and executes
//! each on the worker pool once every dependency has completed. Commands with
//! no ordering constraint between them may run concurrently in any order;
//! nothing here serializes the queue as a whole.
//!
//! Failure is a value: a failed command records its cause on its event and
//! fails every transitive dependent without running it. Errors surface at the
//! join point, [`CommandQueue::wait_all`].

use crate::buffer::Buffer;
use crate::command::{CommandKind, CommandNode};
use crate::error::{Error, Result};
use crate::event::{DepObservation, Event, EventState};
use crate::instrumentation::ExecutionMetrics;
use crate::ops;
use bytemuck::Pod;
use memq_device::{BufferHandle, Device};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Asynchronous command queue over one device
///
/// Cheap to clone; clones share the scheduler state. All buffer access and
/// command submission for a device goes through its queue.
#[derive(Clone)]
pub struct CommandQueue {
    shared: Arc<QueueShared>,
}

/// State shared between the queue handle and in-flight workers.
struct QueueShared {
    device: Arc<dyn Device>,
    /// In-flight command count per buffer id. A buffer with a nonzero count
    /// cannot be freed.
    outstanding: Mutex<HashMap<u64, usize>>,
    next_event_id: AtomicU64,
}

impl CommandQueue {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                device,
                outstanding: Mutex::new(HashMap::new()),
                next_event_id: AtomicU64::new(0),
            }),
        }
    }

    /// The device this queue schedules onto.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.shared.device
    }

    /// Allocate a typed buffer of `len` elements, zero-filled.
    #[tracing::instrument(skip(self), fields(device = self.shared.device.name()))]
    pub fn allocate<T: Pod>(&self, len: usize) -> Result<Buffer<T>> {
        let bytes = len * std::mem::size_of::<T>();
        let handle = self.shared.device.allocate(bytes)?;
        tracing::trace!(%handle, bytes, "buffer allocated");
        Ok(Buffer::new(handle, len))
    }

    /// Free a buffer.
    ///
    /// Fails with [`Error::UseAfterFree`] while any submitted command that
    /// references the buffer has not reached a terminal state.
    #[tracing::instrument(skip(self, buffer), fields(handle = %buffer.handle()))]
    pub fn free<T: Pod>(&self, buffer: Buffer<T>) -> Result<()> {
        let handle = buffer.handle();
        // Hold the accounting lock across the device free so a concurrent
        // submit cannot slip a new reference in between check and release.
        let outstanding = self.shared.outstanding.lock();
        if outstanding.get(&handle.id()).copied().unwrap_or(0) > 0 {
            return Err(Error::UseAfterFree(handle.id()));
        }
        self.shared.device.free(handle)?;
        Ok(())
    }

    /// Submit an element-level fill: `value` into each of the first `count`
    /// elements of `dst`, after `deps`.
    #[tracing::instrument(skip(self, dst, value, deps), fields(dst = %dst.handle()))]
    pub fn fill<T: Pod>(
        &self,
        dst: &Buffer<T>,
        value: T,
        count: usize,
        deps: &[Event],
    ) -> Result<Event> {
        self.submit(
            CommandKind::Fill {
                dst: dst.handle(),
                pattern: bytemuck::bytes_of(&value).to_vec(),
                count,
            },
            deps,
        )
    }

    /// Submit a byte-level set: the byte `value` into each of the first
    /// `len` bytes of `dst`, after `deps`. Element width plays no part.
    #[tracing::instrument(skip(self, dst, deps), fields(dst = %dst.handle()))]
    pub fn byte_set<T: Pod>(
        &self,
        dst: &Buffer<T>,
        value: u8,
        len: usize,
        deps: &[Event],
    ) -> Result<Event> {
        self.submit(
            CommandKind::ByteSet {
                dst: dst.handle(),
                value,
                len,
            },
            deps,
        )
    }

    /// Submit a byte-level copy of `len` bytes from `src` to `dst`, after
    /// `deps`.
    #[tracing::instrument(skip(self, dst, src, deps), fields(dst = %dst.handle(), src = %src.handle()))]
    pub fn byte_copy<T: Pod>(
        &self,
        dst: &Buffer<T>,
        src: &Buffer<T>,
        len: usize,
        deps: &[Event],
    ) -> Result<Event> {
        self.submit(
            CommandKind::ByteCopy {
                dst: dst.handle(),
                src: src.handle(),
                len,
            },
            deps,
        )
    }

    /// Submit one command, ordered after `deps`.
    ///
    /// Returns the command's completion event. Submission itself only fails
    /// on a buffer referenced outside its allocate/free window; execution
    /// errors are recorded on the event instead.
    pub fn submit(&self, kind: CommandKind, deps: &[Event]) -> Result<Event> {
        let buffers = kind.buffers();
        for handle in &buffers {
            // Existence check up front so a dangling handle fails the
            // submission, not a worker later.
            self.shared.device.buffer_size(*handle)?;
        }

        let id = self.shared.next_event_id.fetch_add(1, Ordering::Relaxed) + 1;
        let event = Event::new(id, deps.to_vec());
        let node = CommandNode::new(kind, event.clone());
        retain_buffers(&self.shared, &buffers);

        // Register with each dependency. Dependencies already terminal at
        // registration are folded into one counter adjustment below.
        let mut resolved = 0usize;
        let mut failed_cause: Option<Arc<Error>> = None;
        for dep in deps {
            match dep.register_dependent(&node) {
                DepObservation::Registered => {}
                DepObservation::Completed => resolved += 1,
                DepObservation::Failed(cause) => {
                    if failed_cause.is_none() {
                        failed_cause = Some(cause);
                    }
                }
            }
        }

        if let Some(cause) = failed_cause {
            // Upstream already failed: short-circuit without running. The
            // buffer references are dropped before the Failed state is
            // published, so a caller that observes the event as terminal can
            // free immediately.
            let released = node.event.fail(Arc::clone(&cause), || {
                release_buffers(&self.shared, &node.kind.buffers())
            });
            if let Some(dependents) = released {
                fail_chain(&self.shared, dependents, cause);
            }
            return Ok(event);
        }

        // Exactly one decrementer observes the counter reach zero and owns
        // the spawn, whether that is this fold or a dependency completing
        // concurrently.
        if node.pending.fetch_sub(resolved, Ordering::AcqRel) == resolved {
            spawn_command(Arc::clone(&self.shared), node);
        }

        tracing::trace!(event_id = id, deps = deps.len(), "command submitted");
        Ok(event)
    }

    /// Submit a batch of commands whose dependencies are declared as indices
    /// into the batch.
    ///
    /// The whole batch is validated first: a dependency cycle rejects every
    /// command with [`Error::CyclicDependency`] before anything runs. Events
    /// are returned in batch order.
    #[tracing::instrument(skip(self, batch), fields(commands = batch.len()))]
    pub fn submit_batch(&self, batch: Vec<(CommandKind, Vec<usize>)>) -> Result<Vec<Event>> {
        let n = batch.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, (_, deps)) in batch.iter().enumerate() {
            for &dep in deps {
                if dep >= n {
                    return Err(Error::ExecutionFailure(format!(
                        "dependency index {dep} out of range for batch of {n}"
                    )));
                }
                if dep == i {
                    return Err(Error::CyclicDependency);
                }
                indegree[i] += 1;
                dependents[dep].push(i);
            }
        }

        // Kahn's algorithm; anything left unprocessed sits on a cycle.
        let mut ready: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut topo = Vec::with_capacity(n);
        while let Some(i) = ready.pop_front() {
            topo.push(i);
            for &next in &dependents[i] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }
        if topo.len() < n {
            return Err(Error::CyclicDependency);
        }

        let mut slots: Vec<Option<Event>> = vec![None; n];
        let mut kinds = Vec::with_capacity(n);
        let mut dep_indices = Vec::with_capacity(n);
        for (kind, deps) in batch {
            kinds.push(Some(kind));
            dep_indices.push(deps);
        }
        for i in topo {
            let deps: Vec<Event> = dep_indices[i]
                .iter()
                .filter_map(|&dep| slots[dep].clone())
                .collect();
            let kind = match kinds[i].take() {
                Some(kind) => kind,
                None => return Err(Error::CyclicDependency),
            };
            slots[i] = Some(self.submit(kind, &deps)?);
        }
        let mut events = Vec::with_capacity(n);
        for slot in slots {
            match slot {
                Some(event) => events.push(event),
                None => return Err(Error::CyclicDependency),
            }
        }
        Ok(events)
    }

    /// Join point: block until `events` and all their transitive
    /// dependencies are terminal.
    ///
    /// Returns the recorded cause of the failed event with the smallest id
    /// if any event in the closure failed, so the reported error is
    /// deterministic regardless of worker interleaving.
    #[tracing::instrument(skip(self, events), fields(roots = events.len()))]
    pub fn wait_all(&self, events: &[Event]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut closure = Vec::new();
        let mut frontier: VecDeque<Event> = events.iter().cloned().collect();
        while let Some(event) = frontier.pop_front() {
            if !seen.insert(event.id()) {
                continue;
            }
            frontier.extend(event.dependencies().iter().cloned());
            closure.push(event);
        }

        for event in &closure {
            event.wait_terminal();
        }

        closure.sort_by_key(Event::id);
        for event in &closure {
            if event.state() == EventState::Failed {
                return Err(event
                    .failure_cause()
                    .unwrap_or_else(|| Error::ExecutionFailure("unrecorded cause".into())));
            }
        }
        Ok(())
    }

    /// Read the full contents of a buffer back to host memory.
    pub fn read<T: Pod>(&self, buffer: &Buffer<T>) -> Result<Vec<T>> {
        let width = std::mem::size_of::<T>();
        if width == 0 {
            return Ok(vec![T::zeroed(); buffer.len()]);
        }
        let region = self.shared.device.region(buffer.handle())?;
        let bytes = region.read();
        // The backing store is byte-aligned, so go through unaligned reads
        // rather than a slice cast.
        Ok(bytes
            .chunks_exact(width)
            .take(buffer.len())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Overwrite the buffer prefix with `data`, synchronously.
    pub fn write_slice<T: Pod>(&self, buffer: &Buffer<T>, data: &[T]) -> Result<()> {
        let byte_len = std::mem::size_of_val(data);
        if data.len() > buffer.len() {
            return Err(Error::OutOfBounds {
                offset: 0,
                len: byte_len,
                buffer_size: buffer.size_bytes(),
            });
        }
        let region = self.shared.device.region(buffer.handle())?;
        region.write()[..byte_len].copy_from_slice(bytemuck::cast_slice(data));
        Ok(())
    }

    /// Buffers with at least one in-flight command, for diagnostics.
    pub fn in_flight_buffers(&self) -> usize {
        self.shared.outstanding.lock().len()
    }
}

fn retain_buffers(shared: &QueueShared, buffers: &[BufferHandle]) {
    let mut outstanding = shared.outstanding.lock();
    for handle in buffers {
        *outstanding.entry(handle.id()).or_insert(0) += 1;
    }
}

/// Drop one in-flight reference per buffer. Called exactly once per command,
/// at its terminal transition.
fn release_buffers(shared: &QueueShared, buffers: &[BufferHandle]) {
    let mut outstanding = shared.outstanding.lock();
    for handle in buffers {
        if let Some(count) = outstanding.get_mut(&handle.id()) {
            *count -= 1;
            if *count == 0 {
                outstanding.remove(&handle.id());
            }
        }
    }
}

fn spawn_command(shared: Arc<QueueShared>, node: Arc<CommandNode>) {
    rayon::spawn(move || run_command(shared, node));
}

fn run_command(shared: Arc<QueueShared>, node: Arc<CommandNode>) {
    // An upstream failure may have claimed the event between readiness and
    // this worker picking it up.
    if !node.event.try_begin_running() {
        return;
    }

    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        ops::execute(&node.kind, shared.device.as_ref())
    }));
    let outcome = match outcome {
        Ok(result) => result,
        Err(payload) => Err(Error::ExecutionFailure(panic_message(&payload))),
    };

    match outcome {
        Ok(()) => {
            let elements = match &node.kind {
                CommandKind::Fill { count, .. } => *count,
                CommandKind::ByteSet { len, .. } | CommandKind::ByteCopy { len, .. } => *len,
            };
            ExecutionMetrics::new(
                node.kind.op_name(),
                elements,
                node.kind.span_bytes(),
                start.elapsed(),
            )
            .log();
            release_buffers(&shared, &node.kind.buffers());
            for dependent in node.event.complete() {
                if dependent.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                    spawn_command(Arc::clone(&shared), dependent);
                }
            }
        }
        Err(err) => {
            tracing::warn!(
                event_id = node.event.id(),
                op = node.kind.op_name(),
                error = %err,
                "command failed"
            );
            let cause = Arc::new(err);
            let released = node.event.fail(Arc::clone(&cause), || {
                release_buffers(&shared, &node.kind.buffers())
            });
            if let Some(dependents) = released {
                fail_chain(&shared, dependents, cause);
            }
        }
    }
}

/// Fail every transitive dependent with the root cause, releasing each
/// command's buffer references before its Failed state is published.
fn fail_chain(shared: &QueueShared, initial: Vec<Arc<CommandNode>>, cause: Arc<Error>) {
    let mut stack = initial;
    while let Some(node) = stack.pop() {
        let released = node.event.fail(Arc::clone(&cause), || {
            release_buffers(shared, &node.kind.buffers())
        });
        if let Some(dependents) = released {
            stack.extend(dependents);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {msg}")
    } else {
        "worker panicked".to_string()
    }
}
