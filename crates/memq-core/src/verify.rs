//! Post-state verification
//!
//! [`BufferModel`] replays command semantics on a host-side byte vector
//! using the same primitives the executors run, so the expected post-state
//! is the executors' own arithmetic applied sequentially. Comparison
//! produces a [`VerificationReport`] listing every mismatching element.

use crate::error::{Error, Result};
use crate::ops;
use bytemuck::Pod;
use std::fmt;

/// Host-side replay of one buffer's byte contents
#[derive(Debug, Clone)]
pub struct BufferModel {
    bytes: Vec<u8>,
}

impl BufferModel {
    /// A model of a fresh allocation: `size` zero bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Replay an element-level fill.
    pub fn fill<T: Pod>(&mut self, value: T, count: usize) -> Result<()> {
        ops::fill_bytes(&mut self.bytes, bytemuck::bytes_of(&value), count)
    }

    /// Replay a byte-level set.
    pub fn byte_set(&mut self, value: u8, len: usize) -> Result<()> {
        ops::byte_set_bytes(&mut self.bytes, value, len)
    }

    /// Replay a byte-level copy from another model.
    pub fn byte_copy_from(&mut self, src: &BufferModel, len: usize) -> Result<()> {
        ops::byte_copy_bytes(&mut self.bytes, &src.bytes, len)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The modelled contents as typed elements.
    pub fn elements<T: Pod>(&self) -> Vec<T> {
        let width = std::mem::size_of::<T>();
        if width == 0 {
            return Vec::new();
        }
        self.bytes
            .chunks_exact(width)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

/// One element whose observed value differed from the model
#[derive(Debug, Clone)]
pub struct Mismatch {
    /// Element index within the buffer
    pub location: usize,
    pub expected: String,
    pub actual: String,
}

/// Outcome of comparing a buffer against its model
#[derive(Debug, Clone)]
pub struct VerificationReport {
    /// Elements compared
    pub compared: usize,
    /// Every element that differed, in index order
    pub mismatches: Vec<Mismatch>,
}

impl VerificationReport {
    pub fn is_pass(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Collapse the report into a `Result`, surfacing the first mismatch.
    pub fn into_result(self) -> Result<()> {
        match self.mismatches.into_iter().next() {
            None => Ok(()),
            Some(m) => Err(Error::VerificationMismatch {
                location: m.location,
                expected: m.expected,
                actual: m.actual,
            }),
        }
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pass() {
            write!(f, "{} elements verified", self.compared)
        } else {
            write!(
                f,
                "{} of {} elements mismatched (first at {})",
                self.mismatches.len(),
                self.compared,
                self.mismatches[0].location
            )
        }
    }
}

/// Compare observed elements against expected, element by element.
pub fn compare_elements<T>(expected: &[T], actual: &[T]) -> VerificationReport
where
    T: Pod + PartialEq + fmt::Debug,
{
    let mut mismatches = Vec::new();
    for (location, expected_value) in expected.iter().enumerate() {
        match actual.get(location) {
            Some(actual_value) if actual_value == expected_value => {}
            Some(actual_value) => mismatches.push(Mismatch {
                location,
                expected: format!("{expected_value:?}"),
                actual: format!("{actual_value:?}"),
            }),
            None => mismatches.push(Mismatch {
                location,
                expected: format!("{expected_value:?}"),
                actual: "<missing>".to_string(),
            }),
        }
    }
    VerificationReport {
        compared: expected.len(),
        mismatches,
    }
}
