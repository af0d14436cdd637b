//! Logging utilities for ringguard components.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize tracing with sensible defaults.
///
/// Uses the RUST_LOG environment variable to control log levels.
/// Default level is INFO.
pub fn init() {
    init_with("info", false);
}

/// Initialize tracing with JSON formatting (useful for structured logging).
pub fn init_json() {
    init_with("info", true);
}

/// Initialize tracing with a fallback level used when RUST_LOG is unset.
pub fn init_with(default_level: &str, json: bool) {
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter(default_level))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter(default_level))
            .init();
    }
}
