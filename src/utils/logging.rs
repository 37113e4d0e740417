//! Logging utilities
//!
//! Provides simple logging initialization that:
//! - Respects RUST_LOG environment variable
//! - Allows configuration via config file
//! - Defaults to "info"
//!
//! # Usage
//! ```rust,no_run
//! use modhost::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Pick the effective filter: RUST_LOG, then config, then "info"
fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or("info"))
}

/// Initialize human-readable logging
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g., "info", "modhost::module=debug").
///              RUST_LOG takes precedence when set.
pub fn init_logging(filter: Option<&str>) {
    // Output to stderr, include target, respect NO_COLOR
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(build_filter(filter))
        .init();
}

/// Initialize logging with JSON output (for production/monitoring)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .init();
}

/// Initialize logging from [`LoggingConfig`](crate::config::LoggingConfig)
///
/// Falls back to human-readable output when `json_format` is set but the
/// `json-logging` feature is disabled.
pub fn init_logging_from_config(config: Option<&crate::config::LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}
