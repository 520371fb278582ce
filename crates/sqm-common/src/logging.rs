//! Structured logging initialization, shared by every binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize global tracing based on `LOG_FORMAT` (`json` or text) and
/// `RUST_LOG` (defaults to `info`).
pub fn init_logging(service_name: &str) {
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => init_json_logging(service_name),
        _ => init_text_logging(service_name),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_json_logging(service_name: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_target(true))
        .try_init();
    tracing::info!(service = service_name, format = "json", "logging initialized");
}

fn init_text_logging(service_name: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .try_init();
    tracing::info!(service = service_name, format = "text", "logging initialized");
}

/// Convenience wrapper for quick binaries/tests that don't care about a
/// specific service name.
pub fn init_default_logging() {
    init_logging("sqm");
}
