//! Logging initialization.
//!
//! Logs go to STDERR so that STDOUT stays reserved for JSON output.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("install tracing subscriber: {err}"))
}
