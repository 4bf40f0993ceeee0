//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the configured filter. Module log lines
//! are emitted under the `guest` target, so `RUST_LOG=guest=off` silences
//! them without touching host output.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Target used for lines the module writes through its log imports.
pub const GUEST_TARGET: &str = "guest";

/// Installs the global subscriber.
///
/// # Errors
///
/// A global subscriber is already installed.
pub fn init(filter: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}
