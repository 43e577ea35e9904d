//! Response writers for the synchronous handler surface

use axum::{body::Body, http::StatusCode, response::Response};

/// Sink for a handler's response
pub trait ResponseWriter {
    /// Set the response status. Only the first call takes effect.
    fn write_status(&mut self, status: StatusCode);

    /// Append to the response body. Writing a body without a status implies
    /// 200 OK.
    fn write_body(&mut self, chunk: &[u8]);
}

/// Decorator recording the status a handler writes
///
/// The first status written is captured and forwarded; later ones are
/// forwarded unchanged. A handler that never writes a status reports 200.
pub struct StatusRecorder<'a> {
    inner: &'a mut dyn ResponseWriter,
    status: Option<StatusCode>,
}

impl<'a> StatusRecorder<'a> {
    pub fn new(inner: &'a mut dyn ResponseWriter) -> Self {
        Self { inner, status: None }
    }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }
}

impl ResponseWriter for StatusRecorder<'_> {
    fn write_status(&mut self, status: StatusCode) {
        self.status.get_or_insert(status);
        self.inner.write_status(status);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.inner.write_body(chunk);
    }
}

/// In-memory response, convertible into an axum [`Response`]
#[derive(Debug, Default, Clone)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        response
    }
}

impl ResponseWriter for BufferedResponse {
    fn write_status(&mut self, status: StatusCode) {
        self.status.get_or_insert(status);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_defaults_to_ok() {
        let mut response = BufferedResponse::new();
        let mut recorder = StatusRecorder::new(&mut response);
        recorder.write_body(b"hello");

        assert_eq!(recorder.status(), StatusCode::OK);
        assert_eq!(response.body(), b"hello");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_recorder_keeps_first_status() {
        let mut response = BufferedResponse::new();
        let mut recorder = StatusRecorder::new(&mut response);
        recorder.write_status(StatusCode::NOT_FOUND);
        recorder.write_status(StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(recorder.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_buffered_into_response() {
        let mut response = BufferedResponse::new();
        response.write_status(StatusCode::CREATED);
        response.write_body(b"{}");

        let response = response.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
