//! Structured logging for Kaitai.
//!
//! Console output with environment-based level control, optional NDJSON file
//! rotation, and scrubbing of credentials from strings before they are logged.

pub mod logger;
pub mod redact;

pub use logger::{LoggerGuard, init_logger};
pub use redact::redact_sensitive_data;
