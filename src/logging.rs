//! Logging initialization
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` always wins when
//! set; otherwise the crate logs at info (or debug with `--verbose`) and
//! external crates stay at warn.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Compute the filter spec: RUST_LOG (env) > verbose flag > default.
pub(crate) fn effective_log_spec(verbose: bool) -> String {
    match std::env::var("RUST_LOG") {
        Ok(spec) if !spec.is_empty() => return spec,
        _ => {}
    }

    if verbose {
        "warn,emberdns=debug".to_string()
    } else {
        "warn,emberdns=info".to_string()
    }
}

/// Initialize global logging. Safe to call more than once; later calls
/// are no-ops.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_new(effective_log_spec(verbose))
        .unwrap_or_else(|_| EnvFilter::new("warn,emberdns=info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    Ok(())
}
