//! # memq-core
//!
//! Asynchronous command engine over shared host/device memory. Commands
//! mutate buffers through three primitives (element-level fill, byte-level
//! set, byte-level copy) and are ordered only by explicit event
//! dependencies; everything else may run concurrently on the worker pool.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          CommandQueue (submit / wait_all)   │
//! ├─────────────────────────────────────────────┤
//! │   Event graph          Worker pool (rayon)  │
//! │   Pending → Running → Completed / Failed    │
//! ├─────────────────────────────────────────────┤
//! │   Executors: fill · byte_set · byte_copy    │
//! ├─────────────────────────────────────────────┤
//! │          Device (shared regions)            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use memq_core::CommandQueue;
//! use memq_device::HostDevice;
//! use std::sync::Arc;
//!
//! # fn main() -> memq_core::Result<()> {
//! let queue = CommandQueue::new(Arc::new(HostDevice::new()));
//! let buffer = queue.allocate::<i32>(2)?;
//!
//! let filled = queue.fill(&buffer, 1i32, 2, &[])?;
//! let set = queue.byte_set(&buffer, 10, 4, &[filled])?;
//! queue.wait_all(&[set])?;
//!
//! let contents = buffer.to_vec(&queue)?;
//! assert_eq!(contents[1], 1);
//! queue.free(buffer)?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod command;
pub mod error;
pub mod event;
pub mod instrumentation;
mod ops;
pub mod queue;
pub mod scenario;
pub mod verify;

pub use buffer::{Buffer, ScopedBuffer};
pub use command::CommandKind;
pub use error::{Error, Result};
pub use event::{Event, EventState};
pub use instrumentation::ExecutionMetrics;
pub use queue::CommandQueue;
pub use scenario::{fill_byteset_copy, Outcome};
pub use verify::{compare_elements, BufferModel, Mismatch, VerificationReport};
