//! Error handling utilities for graceful degradation
//!
//! Provides helpers for common error handling patterns with logging and fallbacks.

use std::any::Any;
use tracing::{debug, warn};

/// Execute an operation and return a default value on error
///
/// Returns the result on success, or the default on error (after logging at debug level).
pub fn with_default<F, T, E>(operation: F, default: T, context: &str) -> T
where
    F: FnOnce() -> Result<T, E>,
    E: std::fmt::Display,
{
    match operation() {
        Ok(value) => value,
        Err(e) => {
            debug!("{}: {}, using default", context, e);
            default
        }
    }
}

/// Convert a Result to an Option, logging the error
///
/// Returns `Some(T)` on success, `None` on error (after logging).
pub fn result_to_option<T, E>(result: Result<T, E>, context: &str) -> Option<T>
where
    E: std::fmt::Display,
{
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{}: {}", context, e);
            None
        }
    }
}

/// Best-effort message from a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
