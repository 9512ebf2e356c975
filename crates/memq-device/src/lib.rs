//! Device boundary for the memq engine
//!
//! This crate provides:
//! - **Device Trait**: pluggable device interface (capability query, buffer
//!   allocate/free, shared-region access)
//! - **Host Device**: reference implementation backed by process memory
//! - **Shared Regions**: storage visible to both the host thread and the
//!   asynchronous executors without copying
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Device Trait                         │
//! │  - supports_shared_memory()                              │
//! │  - allocate() / free() / region() / buffer_size()        │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         ▼             ▼             ▼
//!   ┌─────────┐  ┌─────────┐  ┌─────────┐
//!   │  Host   │  │   GPU   │  │  Accel  │
//!   │ Device  │  │ Device  │  │ Device  │
//!   └─────────┘  └─────────┘  └─────────┘
//! ```
//!
//! Only the host device ships today; the trait is the seam where real
//! accelerator devices would plug in.
//!
//! # Usage
//!
//! ```rust
//! use memq_device::{Device, HostDevice};
//!
//! # fn main() -> memq_device::Result<()> {
//! let device = HostDevice::new();
//! assert!(device.supports_shared_memory());
//!
//! let handle = device.allocate(64)?;
//! let region = device.region(handle)?;
//! region.write()[0] = 42;
//! assert_eq!(region.read()[0], 42);
//!
//! device.free(handle)?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod error;
pub mod region;
pub mod types;

pub use device::{Device, HostDevice};
pub use error::{DeviceError, Result};
pub use region::SharedRegion;
pub use types::BufferHandle;
