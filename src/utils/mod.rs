//! Utility modules for logging and graceful degradation

pub mod error;
pub mod logging;

pub use error::{panic_message, result_to_option, with_default};
pub use logging::{init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
