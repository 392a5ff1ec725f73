//! Request/response boundary over `gutiq_core`.
//!
//! # Responsibility
//! - Expose event use-cases as string-in, status-and-JSON-out calls.
//! - Resolve runtime configuration from the environment.

pub mod api;
pub mod config;

pub use api::{parse_timestamp, ApiResponse, EventsApi};
pub use config::ApiConfig;

/// Starts file logging when `config.log_dir` is set.
///
/// Returns `Ok(false)` when logging stays off.
pub fn init_logging(config: &ApiConfig) -> Result<bool, String> {
    match config.log_dir.as_deref() {
        Some(log_dir) => gutiq_core::init_logging(&config.log_level, log_dir).map(|()| true),
        None => Ok(false),
    }
}
