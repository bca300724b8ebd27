//! Logging setup for hosts and tests that have no subscriber of their own.
//!
//! The source only emits `tracing` events; installing a subscriber is the
//! host's decision. [`init_logging`] is a convenience for hosts that do not
//! already have one.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global formatting subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` when set, e.g.
/// `RUST_LOG=arcgis_tilesource=debug`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
