//! Request-scoped correlation context

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context key under which the request identifier travels
pub const REQUEST_ID_KEY: &str = "requestID";
/// Context key under which the user identifier travels
pub const USER_ID_KEY: &str = "userID";
/// Context key under which the trace identifier travels
pub const TRACE_ID_KEY: &str = "traceID";

/// Log field written for the request identifier
pub const REQUEST_ID_FIELD: &str = "request_id";
/// Log field written for the user identifier
pub const USER_ID_FIELD: &str = "user_id";
/// Log field written for the trace identifier
pub const TRACE_ID_FIELD: &str = "trace_id";

/// Identifier tagging every record that belongs to one request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new random correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Adopt an inbound identifier; empty values are rejected
    pub fn from_header(value: &str) -> Option<Self> {
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    /// Use an inbound identifier when present, otherwise generate one
    pub fn resolve(inbound: Option<&str>) -> Self {
        inbound.and_then(Self::from_header).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only correlation values carried alongside a request
///
/// Each identifier is optional. Absent values contribute nothing when a
/// logger is enriched from this context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    request_id: Option<String>,
    user_id: Option<String>,
    trace_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Look a value up by its context key (`requestID`, `userID`, `traceID`)
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            REQUEST_ID_KEY => self.request_id(),
            USER_ID_KEY => self.user_id(),
            TRACE_ID_KEY => self.trace_id(),
            _ => None,
        }
    }

    /// Log fields for the values that are present, in a stable order
    pub fn log_fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (REQUEST_ID_FIELD, self.request_id()),
            (USER_ID_FIELD, self.user_id()),
            (TRACE_ID_FIELD, self.trace_id()),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.log_fields().next().is_none()
    }
}
