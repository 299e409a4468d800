//! Log output for the server binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info,deathgame=debug";

/// Installs a formatted subscriber filtered by `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set, so tests and
/// embedding applications can install their own first.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();

    if installed.is_ok() {
        tracing::debug!(default = DEFAULT_FILTER, "logging initialized");
    }
}
