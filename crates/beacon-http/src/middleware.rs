//! axum middleware for request lifecycle logging

use crate::{
    handler::LoggingHandler,
    lifecycle::{Completion, CompletionPolicy, RequestLog},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use beacon_log::Logger;
use futures::FutureExt;
use std::panic::{self, AssertUnwindSafe};

/// Logger and completion policy shared by every request
///
/// Used as the state of [`request_logging`] and as the factory for
/// [`LoggingHandler`]s.
#[derive(Debug, Clone)]
pub struct RequestLogging {
    logger: Logger,
    policy: CompletionPolicy,
}

impl RequestLogging {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            policy: CompletionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CompletionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Wrap a synchronous handler with the same lifecycle logging
    pub fn wrap<H>(&self, handler: H) -> LoggingHandler<H> {
        LoggingHandler::new(self.clone(), handler)
    }
}

/// Log "Request started" and "Request completed" around the rest of the
/// chain
///
/// The request carries its [`RequestContext`](beacon_log::RequestContext) as
/// an extension, so downstream extractors can read the correlation id. The
/// remote address is taken from `ConnectInfo<SocketAddr>` when the server was
/// built with `into_make_service_with_connect_info`, and is empty otherwise.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/", get(root))
///     .layer(middleware::from_fn_with_state(logging, request_logging));
/// ```
pub async fn request_logging(
    State(logging): State<RequestLogging>,
    mut request: Request,
    next: Next,
) -> Response {
    let log = RequestLog::begin(&logging.logger, &mut request);
    let completion = Completion::new(log, logging.policy);

    let response = match logging.policy {
        CompletionPolicy::SkipOnPanic => next.run(request).await,
        CompletionPolicy::Always => {
            match AssertUnwindSafe(next.run(request)).catch_unwind().await {
                Ok(response) => response,
                Err(payload) => {
                    completion.panicked();
                    panic::resume_unwind(payload)
                }
            }
        }
    };

    completion.finish(response.status());
    response
}
