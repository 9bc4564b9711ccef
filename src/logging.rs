//! Logging setup for the CLI
//!
//! Diagnostics go to stderr so stdout stays reserved for the JSON result.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber
///
/// Respects `RUST_LOG` when set; otherwise logs warnings, or debug output
/// for this crate when `verbose` is requested.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shiptrack=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shiptrack=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
