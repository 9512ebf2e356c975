//! Command descriptions
//!
//! A command is an operation tag plus its parameters and target buffers.
//! Commands are immutable once submitted; the queue owns the scheduling
//! bookkeeping around them.

use crate::event::Event;
use memq_device::BufferHandle;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

/// One of the three primitive memory mutators
///
/// The replication units differ deliberately:
///
/// - [`Fill`](CommandKind::Fill) broadcasts an *element-sized* pattern,
/// - [`ByteSet`](CommandKind::ByteSet) replicates a *single byte* regardless
///   of element width,
/// - [`ByteCopy`](CommandKind::ByteCopy) moves raw bytes verbatim.
///
/// A byte-set spanning one 4-byte element with value `10` therefore yields
/// the element `0x0A0A0A0A`, not the integer `10`.
#[derive(Debug, Clone)]
pub enum CommandKind {
    /// Write the element-sized `pattern` into each of the first `count`
    /// elements of `dst`.
    Fill {
        dst: BufferHandle,
        pattern: Vec<u8>,
        count: usize,
    },
    /// Write the single byte `value` into each of the first `len` bytes of
    /// `dst`.
    ByteSet {
        dst: BufferHandle,
        value: u8,
        len: usize,
    },
    /// Copy `len` bytes verbatim from `src` to `dst`.
    ByteCopy {
        dst: BufferHandle,
        src: BufferHandle,
        len: usize,
    },
}

impl CommandKind {
    /// Operation tag, for logs and metrics.
    pub fn op_name(&self) -> &'static str {
        match self {
            CommandKind::Fill { .. } => "fill",
            CommandKind::ByteSet { .. } => "byte_set",
            CommandKind::ByteCopy { .. } => "byte_copy",
        }
    }

    /// Every buffer the command references, for outstanding-command
    /// accounting.
    pub fn buffers(&self) -> Vec<BufferHandle> {
        match self {
            CommandKind::Fill { dst, .. } | CommandKind::ByteSet { dst, .. } => vec![*dst],
            CommandKind::ByteCopy { dst, src, .. } => vec![*dst, *src],
        }
    }

    /// Bytes the command writes when it succeeds, for metrics.
    pub(crate) fn span_bytes(&self) -> usize {
        match self {
            CommandKind::Fill { pattern, count, .. } => pattern.len() * count,
            CommandKind::ByteSet { len, .. } | CommandKind::ByteCopy { len, .. } => *len,
        }
    }
}

/// Scheduler-side record of a submitted command.
pub(crate) struct CommandNode {
    pub(crate) kind: CommandKind,
    pub(crate) event: Event,
    /// Dependencies not yet observed Completed. The node becomes ready when
    /// this reaches zero; upstream failure short-circuits it instead.
    pub(crate) pending: AtomicUsize,
}

impl CommandNode {
    pub(crate) fn new(kind: CommandKind, event: Event) -> Arc<Self> {
        let pending = AtomicUsize::new(event.dependencies().len());
        Arc::new(Self {
            kind,
            event,
            pending,
        })
    }
}
