//! Tracing setup for the storydiff binary.
//!
//! Log events go to stderr so stdout carries only the diff (or the model's
//! reply when it skipped the tool).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "storydiff=info";

/// Initialize the global subscriber.
///
/// Reads `RUST_LOG`; defaults to `storydiff=info`. Output is timestamped.
///
/// # Example
/// ```bash
/// RUST_LOG=storydiff=trace storydiff run
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
