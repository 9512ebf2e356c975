//! Memory operation executors
//!
//! The three primitive mutators behind the queue: element-level fill,
//! byte-level set, and byte-level copy. The byte-level ops ignore element
//! width entirely; capturing that distinction is the point of this module.
//!
//! The byte-slice primitives are shared with the verifier so the expected
//! post-state is computed with exactly the executor semantics.

use crate::command::CommandKind;
use crate::error::{Error, Result};
use memq_device::Device;

/// Execute one command against the device's shared regions.
///
/// Called from a worker; every failure is returned as a value and recorded
/// on the command's event by the caller, never propagated as a panic.
pub(crate) fn execute(kind: &CommandKind, device: &dyn Device) -> Result<()> {
    match kind {
        CommandKind::Fill {
            dst,
            pattern,
            count,
        } => {
            let region = device.region(*dst)?;
            let mut bytes = region.write();
            fill_bytes(&mut bytes, pattern, *count)
        }
        CommandKind::ByteSet { dst, value, len } => {
            let region = device.region(*dst)?;
            let mut bytes = region.write();
            byte_set_bytes(&mut bytes, *value, *len)
        }
        CommandKind::ByteCopy { dst, src, len } => {
            let dst_region = device.region(*dst)?;
            let src_region = device.region(*src)?;
            // Stage through a host copy: keeps the src read lock and the dst
            // write lock from ever being held together, and makes a
            // full-range self-copy an identity write.
            let staged = {
                let src_bytes = src_region.read();
                if *len > src_bytes.len() {
                    return Err(Error::OutOfBounds {
                        offset: 0,
                        len: *len,
                        buffer_size: src_bytes.len(),
                    });
                }
                src_bytes[..*len].to_vec()
            };
            let mut dst_bytes = dst_region.write();
            byte_copy_bytes(&mut dst_bytes, &staged, *len)
        }
    }
}

/// Element-level broadcast: write the element-sized `pattern` into each of
/// the first `count` elements of `dst`.
pub(crate) fn fill_bytes(dst: &mut [u8], pattern: &[u8], count: usize) -> Result<()> {
    if pattern.is_empty() || dst.len() % pattern.len() != 0 {
        return Err(Error::InvalidAlignment {
            byte_len: dst.len(),
            element_size: pattern.len(),
        });
    }
    let span = pattern.len() * count;
    if span > dst.len() {
        return Err(Error::OutOfBounds {
            offset: 0,
            len: span,
            buffer_size: dst.len(),
        });
    }
    for element in dst[..span].chunks_exact_mut(pattern.len()) {
        element.copy_from_slice(pattern);
    }
    Ok(())
}

/// Byte-level set: write `value` into each of the first `len` bytes,
/// irrespective of element width.
pub(crate) fn byte_set_bytes(dst: &mut [u8], value: u8, len: usize) -> Result<()> {
    if len > dst.len() {
        return Err(Error::OutOfBounds {
            offset: 0,
            len,
            buffer_size: dst.len(),
        });
    }
    dst[..len].fill(value);
    Ok(())
}

/// Byte-level copy: move `len` bytes verbatim from `src` to `dst`.
pub(crate) fn byte_copy_bytes(dst: &mut [u8], src: &[u8], len: usize) -> Result<()> {
    if len > src.len() {
        return Err(Error::OutOfBounds {
            offset: 0,
            len,
            buffer_size: src.len(),
        });
    }
    if len > dst.len() {
        return Err(Error::OutOfBounds {
            offset: 0,
            len,
            buffer_size: dst.len(),
        });
    }
    dst[..len].copy_from_slice(&src[..len]);
    Ok(())
}
