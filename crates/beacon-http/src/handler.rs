//! Synchronous handler surface

use crate::{
    lifecycle::{Completion, CompletionPolicy, RequestLog},
    middleware::RequestLogging,
    writer::{ResponseWriter, StatusRecorder},
};
use axum::http::Request;
use beacon_log::Logger;
use std::panic::{self, AssertUnwindSafe};

/// A request handler writing its response through a [`ResponseWriter`]
///
/// The request's [`RequestContext`](beacon_log::RequestContext) is available
/// from its extensions once it has passed through a [`LoggingHandler`].
pub trait Handler<B>: Send + Sync {
    fn serve(&self, request: &Request<B>, writer: &mut dyn ResponseWriter);
}

impl<B, F> Handler<B> for F
where
    F: Fn(&Request<B>, &mut dyn ResponseWriter) + Send + Sync,
{
    fn serve(&self, request: &Request<B>, writer: &mut dyn ResponseWriter) {
        self(request, writer)
    }
}

/// Wrap `handler` so every request it serves is logged through `logger`
pub fn logging_handler<H>(logger: Logger, handler: H) -> LoggingHandler<H> {
    RequestLogging::new(logger).wrap(handler)
}

/// A [`Handler`] wrapped with request lifecycle logging
#[derive(Clone)]
pub struct LoggingHandler<H> {
    logging: RequestLogging,
    inner: H,
}

impl<H> LoggingHandler<H> {
    pub(crate) fn new(logging: RequestLogging, inner: H) -> Self {
        Self { logging, inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Serve one request
    ///
    /// The request is rebound to its enriched context before the inner
    /// handler sees it. The first status the inner handler writes is logged
    /// on completion, 200 when it writes none.
    pub fn serve<B>(&self, mut request: Request<B>, writer: &mut dyn ResponseWriter)
    where
        H: Handler<B>,
    {
        let log = RequestLog::begin(self.logging.logger(), &mut request);
        let completion = Completion::new(log, self.logging.policy());
        let mut recorder = StatusRecorder::new(writer);

        match completion.policy() {
            CompletionPolicy::SkipOnPanic => self.inner.serve(&request, &mut recorder),
            CompletionPolicy::Always => {
                let served = panic::catch_unwind(AssertUnwindSafe(|| {
                    self.inner.serve(&request, &mut recorder)
                }));
                if let Err(payload) = served {
                    completion.panicked();
                    panic::resume_unwind(payload);
                }
            }
        }

        completion.finish(recorder.status());
    }
}
