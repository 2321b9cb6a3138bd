//! Telemetry and logging initialization
//!
//! Provides structured logging with `tracing` and `tracing-subscriber`.
//! SiteMirror runs inside a host's save path, so all logs go to stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing subscriber with appropriate configuration
///
/// # Arguments
/// * `verbose` - If true, sets log level to DEBUG for SiteMirror crates, otherwise INFO
/// * `json_format` - If true, outputs logs in JSON format for machine parsing
///
/// # Example
/// ```
/// mirror_common::telemetry::init_tracing(false, false);
/// tracing::info!("Host started");
/// ```
pub fn init_tracing(verbose: bool, json_format: bool) {
    let filter_level = if verbose {
        "info,mirror_sync=debug,mirror_store=debug"
    } else {
        "info"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_level));

    if json_format {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .with(env_filter)
            .init();
    }
}
