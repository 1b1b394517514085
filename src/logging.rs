//! Structured logging
//!
//! Diagnostics go through `tracing` with structured fields:
//!
//! - `task`: qualified name of the task involved
//! - `operation`: cache operation (`lookup`, `store`, `decode`)
//! - `status`: outcome (`hit`, `miss`, `skipped`)
//! - `cache_key`: content-addressed key of the build
//!
//! User-facing progress lines are printed separately by the runner.

use crate::runner::Verbosity;
use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directive for a verbosity level
pub fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Silent => "off",
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "debug",
    }
}

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the verbosity-derived level. Calling this
/// more than once is harmless.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .try_init();
}
