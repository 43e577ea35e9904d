//! # Beacon Log
//!
//! Structured, contextual logging handles for services.
//!
//! ## Features
//!
//! - **Identity Fields**: every record carries business, service, version,
//!   environment and hostname
//! - **Context Enrichment**: request, user and trace identifiers folded in from a
//!   typed [`RequestContext`]
//! - **Immutable Handles**: `with_field`/`with_fields`/`with_context` return new
//!   handles and never touch the receiver
//! - **Pluggable Sinks**: stderr by default, any `io::Write`, or a size-rotated
//!   file with gzip compression and retention
//! - **Pluggable Encodings**: colorized text in development, JSON lines elsewhere
//! - **Hooks**: ordered extension points invoked on every emission
//!
//! ## Quick Start
//!
//! ```rust
//! use beacon_log::{Logger, LoggerConfig, RequestContext};
//!
//! let mut config = LoggerConfig::default();
//! config.business = "payments".to_string();
//! config.service = "ledger".to_string();
//! config.environment = "production".to_string();
//!
//! let logger = Logger::new(config);
//! logger.info("Service started");
//!
//! let ctx = RequestContext::new().with_request_id("req-42");
//! logger.with_context(&ctx).with_field("amount", 1200).info("Charge accepted");
//! ```
//!
//! The backend is a `tracing-subscriber` pipeline owned by the handle. Nothing
//! is installed as the global default subscriber.

pub mod config;
pub mod context;
pub mod formatters;
pub mod hooks;
pub mod logger;
pub mod rotation;
pub mod sink;

#[cfg(test)]
mod tests;

pub use config::{FileOutputConfig, LoggerConfig, Severity};
pub use context::{CorrelationId, RequestContext};
pub use hooks::{Hook, Record};
pub use logger::{Fields, Logger};
pub use rotation::RotatingFileWriter;
pub use sink::{SharedBuffer, Sink};

/// Result type for logging operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading configuration or managing log files.
///
/// Emission itself never fails; these only surface from explicit calls such
/// as [`LoggerConfig::load`] or [`rotation::LogFileManager`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Log rotation error: {message}")]
    Rotation { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
