//! Performance instrumentation for memory operations

use std::time::Duration;

/// Timing captured around one executed command
#[derive(Debug, Clone)]
pub struct ExecutionMetrics {
    /// Operation tag ("fill", "byte_set", "byte_copy")
    pub op: &'static str,
    /// Elements touched (equals bytes for the byte-level ops)
    pub elements: usize,
    /// Bytes written
    pub bytes: usize,
    /// Wall-clock execution time
    pub total_duration: Duration,
}

impl ExecutionMetrics {
    pub fn new(op: &'static str, elements: usize, bytes: usize, total_duration: Duration) -> Self {
        Self {
            op,
            elements,
            bytes,
            total_duration,
        }
    }

    /// Elements processed per second
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.total_duration.as_secs_f64();
        if secs > 0.0 {
            self.elements as f64 / secs
        } else {
            0.0
        }
    }

    /// Effective memory bandwidth in GB/s
    pub fn memory_bandwidth_gbps(&self) -> f64 {
        let secs = self.total_duration.as_secs_f64();
        if secs > 0.0 {
            (self.bytes as f64 / 1e9) / secs
        } else {
            0.0
        }
    }

    /// Emit the metrics through the tracing backbone.
    pub fn log(&self) {
        tracing::debug!(
            op = self.op,
            elements = self.elements,
            bytes = self.bytes,
            duration_us = self.total_duration.as_micros() as u64,
            ops_per_sec = self.ops_per_second(),
            bandwidth_gbps = self.memory_bandwidth_gbps(),
            "command executed"
        );
    }
}
