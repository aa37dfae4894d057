//! Per-run engine log.
//!
//! Installed once the run directory exists: everything the engine traces
//! goes to `.delta/<run_id>/engine.log` (ANSI off); `-v` mirrors it to
//! stderr.

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub fn init_run_logging(log_path: &Path, verbose: bool) -> anyhow::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Arc::new(file));

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    let result = if verbose {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry.try_init()
    };
    // A second init in the same process (tests) is harmless.
    let _ = result;
    Ok(())
}
