//! # Beacon HTTP
//!
//! Request lifecycle logging on top of [`beacon_log`].
//!
//! Every request gets a correlation identifier (the inbound `X-Request-ID`
//! header when it is non-empty, otherwise a fresh UUID v4), a
//! [`RequestContext`](beacon_log::RequestContext) carrying it, and two
//! informational records: "Request started" with method, path and remote
//! address, and "Request completed" with method, path, status and duration.
//!
//! Two surfaces share the same lifecycle:
//!
//! - [`request_logging`], an axum middleware function for
//!   `axum::middleware::from_fn_with_state`
//! - [`LoggingHandler`], a wrapper around the synchronous [`Handler`] trait
//!   writing through a [`ResponseWriter`]
//!
//! ```rust,no_run
//! use axum::{middleware, routing::get, Router};
//! use beacon_http::{request_logging, RequestLogging};
//! use beacon_log::Logger;
//!
//! let logging = RequestLogging::new(Logger::with_defaults("payments", "ledger"));
//! let app: Router = Router::new()
//!     .route("/health", get(|| async { "ok" }))
//!     .layer(middleware::from_fn_with_state(logging, request_logging));
//! ```

pub mod handler;
pub mod lifecycle;
pub mod middleware;
pub mod writer;

pub use handler::{logging_handler, Handler, LoggingHandler};
pub use lifecycle::CompletionPolicy;
pub use middleware::{request_logging, RequestLogging};
pub use writer::{BufferedResponse, ResponseWriter, StatusRecorder};

/// Header carrying an inbound correlation identifier
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
