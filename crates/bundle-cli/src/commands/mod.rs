//! Command implementations for bundle-cli

pub mod deploy;
pub mod estimate;
pub mod snapshot;
pub mod status;

pub use deploy::{DeployMode, run_deploy};
pub use estimate::run_estimate;
pub use snapshot::run_snapshot;
pub use status::run_status;

use serde::Serialize;

use crate::error::Result;

/// Print a value as pretty JSON on stdout.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
