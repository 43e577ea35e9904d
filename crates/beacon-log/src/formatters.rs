//! Record encodings: colorized text for development, JSON lines otherwise

use crate::{config::Severity, logger::Fields};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
};

/// Event field carrying the record severity (fatal/panic have no tracing level)
pub(crate) const SEVERITY_FIELD: &str = "beacon.severity";
/// Event field carrying a handle's bound fields as a JSON object
pub(crate) const BOUND_FIELDS_FIELD: &str = "beacon.fields";

const RESERVED_KEYS: [&str; 3] = ["timestamp", "level", "message"];

/// Structured encoding: one JSON object per record
///
/// Every record carries `timestamp`, `level` and `message`; bound fields are
/// flattened next to them. A bound field named like one of those three is
/// written as `fields.<key>` so it cannot clobber them.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, event: &Event<'_>) -> Value {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let severity = visitor.severity_or(event);
        record_object(
            Utc::now(),
            severity,
            visitor.message.as_deref().unwrap_or_default(),
            visitor.fields,
        )
    }
}

/// JSON object for one record: `timestamp`, `level`, `message`, then the
/// fields flattened, with reserved names moved to `fields.<key>`
pub(crate) fn record_object(
    timestamp: DateTime<Utc>,
    severity: Severity,
    message: &str,
    fields: impl IntoIterator<Item = (String, Value)>,
) -> Value {
    let mut object = Map::new();
    object.insert(
        "timestamp".to_string(),
        json!(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    object.insert("level".to_string(), json!(severity.as_str()));
    object.insert("message".to_string(), json!(message));

    for (key, value) in fields {
        if RESERVED_KEYS.contains(&key.as_str()) {
            object.insert(format!("fields.{}", key), value);
        } else {
            object.insert(key, value);
        }
    }

    Value::Object(object)
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let line = serde_json::to_string(&self.render(event)).map_err(|_| fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

/// Human-readable encoding for development
///
/// `INFO[2024-01-01T12:00:00.000Z] message   key=value ...` with the level
/// tag colorized when the writer accepts ANSI escapes.
#[derive(Debug, Clone, Default)]
pub struct TextFormatter;

impl TextFormatter {
    pub fn new() -> Self {
        Self
    }

    fn color(severity: Severity) -> &'static str {
        match severity {
            Severity::Trace | Severity::Debug => "\x1b[37m",
            Severity::Info => "\x1b[36m",
            Severity::Warn => "\x1b[33m",
            Severity::Error | Severity::Fatal | Severity::Panic => "\x1b[31m",
        }
    }

    fn tag(severity: Severity) -> String {
        let mut tag = severity.as_str().to_uppercase();
        tag.truncate(4);
        tag
    }
}

impl<S, N> FormatEvent<S, N> for TextFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let severity = visitor.severity_or(event);
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let ansi = writer.has_ansi_escapes();

        if ansi {
            write!(
                writer,
                "{}{}\x1b[0m[{}] ",
                Self::color(severity),
                Self::tag(severity),
                timestamp
            )?;
        } else {
            write!(writer, "{}[{}] ", Self::tag(severity), timestamp)?;
        }

        write!(writer, "{:<44}", visitor.message.unwrap_or_default())?;

        for (key, value) in &visitor.fields {
            let value_str = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if ansi {
                write!(
                    writer,
                    " {}{}\x1b[0m={}",
                    Self::color(severity),
                    key,
                    value_str
                )?;
            } else {
                write!(writer, " {}={}", key, value_str)?;
            }
        }

        writeln!(writer)
    }
}

/// Collects an event's message, severity and fields
///
/// Bound fields arrive as one JSON-encoded string and are expanded back into
/// individual fields here.
#[derive(Debug, Default)]
pub(crate) struct EventVisitor {
    pub(crate) message: Option<String>,
    pub(crate) severity: Option<Severity>,
    pub(crate) fields: Fields,
}

impl EventVisitor {
    fn severity_or(&self, event: &Event<'_>) -> Severity {
        self.severity
            .unwrap_or_else(|| Severity::from(*event.metadata().level()))
    }

    fn insert(&mut self, field: &tracing::field::Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl tracing::field::Visit for EventVisitor {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.insert(field, json!(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.insert(field, json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.insert(field, json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.insert(field, json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            SEVERITY_FIELD => self.severity = value.parse().ok(),
            BOUND_FIELDS_FIELD => {
                if let Ok(bound) = serde_json::from_str::<Fields>(value) {
                    // Event-level fields win over bound ones
                    for (key, value) in bound {
                        self.fields.entry(key).or_insert(value);
                    }
                }
            }
            _ => self.insert(field, json!(value)),
        }
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.insert(field, json!(value.to_string()));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, json!(format!("{:?}", value)));
        }
    }
}
