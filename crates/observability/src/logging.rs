//! Structured logging setup via `tracing-subscriber`
//!
//! Configurable via environment:
//! - `WHISPR_LOG_LEVEL`: trace/debug/info/warn/error, default `info`
//! - `WHISPR_LOG_FORMAT`: text/json, default `text`

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the logging system. Reads `WHISPR_LOG_LEVEL`/`WHISPR_LOG_FORMAT`
/// from the environment, falling back to the given defaults.
pub fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env("WHISPR_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format_env = std::env::var("WHISPR_LOG_FORMAT").unwrap_or_else(|_| format.to_string());

    match format_env.as_str() {
        "json" => {
            fmt().json().with_env_filter(filter).with_target(true).with_thread_ids(true).with_current_span(true).init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Configured log level from the environment. Fallback: `"info"`.
pub fn log_level_from_env() -> String {
    std::env::var("WHISPR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

/// Configured log format from the environment. Fallback: `"text"`.
pub fn log_format_from_env() -> String {
    std::env::var("WHISPR_LOG_FORMAT").unwrap_or_else(|_| "text".to_string())
}

pub fn is_valid_log_level(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

pub fn is_valid_log_format(format: &str) -> bool {
    matches!(format, "text" | "json")
}
