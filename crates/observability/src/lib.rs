//! # whispr-observability
//!
//! Ambient logging setup shared by the signaling server and its CLI.
//! Metrics and HTTP health surfaces are outside SPEC_FULL.md's scope, so
//! this crate only carries `tracing`/`tracing-subscriber` initialization.

pub mod logging;

pub use logging::{init_logging, is_valid_log_format, is_valid_log_level, log_format_from_env, log_level_from_env};
