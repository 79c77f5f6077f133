//! Diagnostic logging.
//!
//! The harness logs through `tracing`; [`init`] installs the stderr subscriber the
//! binary uses. Consumer log messages arrive through a [`LogHandler`] and are
//! re-emitted as `tracing` events by [`tracing_log_handler`].

use crate::backends::{LogHandler, LogPriority};
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber on stderr.
///
/// `RUST_LOG` wins over `default_directive`. Calling this more than once is
/// harmless: later calls leave the first subscriber in place.
pub fn init(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Forward consumer log messages to `tracing`, under the `consumer` target.
pub fn tracing_log_handler() -> LogHandler {
    Box::new(|priority, message| match priority {
        LogPriority::Debug => tracing::debug!(target: "consumer", "{message}"),
        LogPriority::Info => tracing::info!(target: "consumer", "{message}"),
        LogPriority::Error => tracing::error!(target: "consumer", "{message}"),
    })
}
