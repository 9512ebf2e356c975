//! Run the reference fill/byte-set/byte-copy workload on the host device.
//!
//! ```sh
//! cargo run -p memq-core --example run_workload
//! ```

use memq_core::{fill_byteset_copy, Outcome};
use memq_device::HostDevice;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    if let Err(err) = memq_tracing::init_global_tracing(&memq_tracing::TracingConfig::from_env()) {
        eprintln!("tracing setup failed: {err}");
        return ExitCode::FAILURE;
    }

    match fill_byteset_copy(Arc::new(HostDevice::new())) {
        Ok(Outcome::Passed) => {
            println!("workload passed");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Skipped(reason)) => {
            println!("workload skipped: {reason}");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Failed(report)) => {
            eprintln!("workload failed: {report}");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("workload error: {err}");
            ExitCode::FAILURE
        }
    }
}
