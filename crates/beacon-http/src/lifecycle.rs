//! Per-request lifecycle shared by the middleware and the handler wrapper

use crate::REQUEST_ID_HEADER;
use axum::{
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use beacon_log::{CorrelationId, Logger, RequestContext};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Instant;

/// What happens to the "Request completed" record when the handler does not
/// return normally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// A panicking handler propagates and no completion record is written
    #[default]
    SkipOnPanic,
    /// Always write the completion record. A panicking handler is logged with
    /// status 500 and `outcome = "panicked"` before the panic resumes; a
    /// request future dropped before finishing is logged with
    /// `outcome = "cancelled"`.
    Always,
}

/// State captured when a request enters the lifecycle
pub(crate) struct RequestLog {
    logger: Logger,
    method: String,
    path: String,
    start: Instant,
}

impl RequestLog {
    /// Resolve the correlation id, rebind the request to the enriched
    /// context and log "Request started"
    pub(crate) fn begin<B>(base: &Logger, request: &mut Request<B>) -> Self {
        let start = Instant::now();

        let inbound = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok());
        let request_id = CorrelationId::resolve(inbound);

        // Identifiers set by earlier layers survive; the request id is replaced
        let ctx = request
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default()
            .with_request_id(request_id.into_string());

        let remote_address = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        let logger = base.with_context(&ctx);
        request.extensions_mut().insert(ctx);

        let method = request.method().to_string();
        let path = request.uri().path().to_string();

        logger
            .with_fields([
                ("method", Value::from(method.as_str())),
                ("path", Value::from(path.as_str())),
                ("remote_address", Value::from(remote_address)),
            ])
            .info("Request started");

        Self {
            logger,
            method,
            path,
            start,
        }
    }

    fn complete(self, status: StatusCode, outcome: Option<&str>) {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        let mut logger = self.logger.with_fields([
            ("method", Value::from(self.method)),
            ("path", Value::from(self.path)),
            ("status", Value::from(status.as_u16())),
            ("duration_ms", Value::from(duration_ms)),
        ]);
        if let Some(outcome) = outcome {
            logger = logger.with_field("outcome", outcome);
        }
        logger.info("Request completed");
    }
}

/// Drop guard writing the completion record exactly once
pub(crate) struct Completion {
    log: Option<RequestLog>,
    policy: CompletionPolicy,
}

impl Completion {
    pub(crate) fn new(log: RequestLog, policy: CompletionPolicy) -> Self {
        Self {
            log: Some(log),
            policy,
        }
    }

    pub(crate) fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// The handler returned with `status`
    pub(crate) fn finish(mut self, status: StatusCode) {
        if let Some(log) = self.log.take() {
            log.complete(status, None);
        }
    }

    /// The handler panicked; only reached under [`CompletionPolicy::Always`]
    pub(crate) fn panicked(mut self) {
        if let Some(log) = self.log.take() {
            log.complete(StatusCode::INTERNAL_SERVER_ERROR, Some("panicked"));
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(log) = self.log.take() {
            if self.policy == CompletionPolicy::Always {
                log.complete(StatusCode::INTERNAL_SERVER_ERROR, Some("cancelled"));
            }
        }
    }
}
