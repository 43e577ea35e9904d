//! Logger handles and the backend pipeline behind them

use crate::{
    config::{LoggerConfig, Severity},
    context::RequestContext,
    formatters::{JsonFormatter, TextFormatter},
    hooks::HookLayer,
    rotation::RotatingFileWriter,
    sink::Sink,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::{dispatcher, Dispatch, Level, Subscriber};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{writer::BoxMakeWriter, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    Layer, Registry,
};

/// Target used for every record emitted through a [`Logger`]
pub const TARGET: &str = "beacon";

/// Field set bound to a logger handle
pub type Fields = BTreeMap<String, Value>;

/// Immutable, field-bound logging handle
///
/// Cloning is cheap. Enrichment (`with_field`, `with_fields`, `with_context`)
/// returns a new handle sharing the same backend; the receiver is never
/// modified, so one handle can be shared freely across threads and requests.
#[derive(Clone)]
pub struct Logger {
    backend: Arc<Backend>,
    fields: Arc<Fields>,
}

/// Pipeline shared by a root logger and every handle derived from it
struct Backend {
    dispatch: Dispatch,
    threshold: Severity,
    output: Output,
}

/// Where the backend writes, kept for flushing before the process exits
#[derive(Clone)]
enum Output {
    Sink(Sink),
    File(RotatingFileWriter),
}

impl Output {
    fn select(config: &LoggerConfig) -> Self {
        if let Some(sink) = &config.output {
            Output::Sink(sink.clone())
        } else if let Some(file) = &config.file_output {
            Output::File(RotatingFileWriter::new(file.clone()))
        } else {
            Output::Sink(Sink::default())
        }
    }

    fn make_writer(&self) -> BoxMakeWriter {
        match self {
            Output::Sink(sink) => BoxMakeWriter::new(sink.clone()),
            Output::File(file) => BoxMakeWriter::new(file.clone()),
        }
    }

    fn flush(&self) {
        let result = match self {
            Output::Sink(sink) => sink.make_writer().flush(),
            Output::File(file) => file.make_writer().flush(),
        };
        if let Err(e) = result {
            eprintln!("Failed to flush log output: {}", e);
        }
    }
}

impl Logger {
    /// Build the backend pipeline and a handle bound to the service identity
    ///
    /// Sink priority is `output`, then `file_output`, then stderr. Records are
    /// colorized text when the environment is "development" and JSON lines
    /// otherwise. Hooks fire in order on every emission.
    pub fn new(config: LoggerConfig) -> Self {
        let output = Output::select(&config);
        let dispatch = Self::build_dispatch(&config, &output);

        let mut fields = Fields::new();
        fields.insert("business".to_string(), Value::from(config.business));
        fields.insert("service".to_string(), Value::from(config.service));
        fields.insert("version".to_string(), Value::from(config.version));
        fields.insert("environment".to_string(), Value::from(config.environment));
        fields.insert(
            "hostname".to_string(),
            Value::from(resolve_hostname().unwrap_or_default()),
        );

        Self {
            backend: Arc::new(Backend {
                dispatch,
                threshold: config.level,
                output,
            }),
            fields: Arc::new(fields),
        }
    }

    /// Default configuration with the given business and service names
    pub fn with_defaults(business: impl Into<String>, service: impl Into<String>) -> Self {
        Self::new(LoggerConfig::for_service(business, service))
    }

    fn build_dispatch(config: &LoggerConfig, output: &Output) -> Dispatch {
        let subscriber = Registry::default()
            .with(Self::build_level_filter(config.level))
            .with(HookLayer::new(config.hooks.clone()))
            .with(Self::build_format_layer(config, output));

        Dispatch::new(subscriber)
    }

    /// Fatal and panic are emitted at ERROR, so the backend never filters
    /// above it; the handle enforces the stricter thresholds itself.
    fn build_level_filter(level: Severity) -> LevelFilter {
        LevelFilter::from_level(level.into())
    }

    fn build_format_layer<S>(
        config: &LoggerConfig,
        output: &Output,
    ) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let writer = output.make_writer();

        if config.is_development() {
            // Rotated files stay free of escape sequences
            let ansi = !matches!(output, Output::File(_));
            tracing_subscriber::fmt::layer()
                .event_format(TextFormatter::new())
                .with_writer(writer)
                .with_ansi(ansi)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .event_format(JsonFormatter::new())
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        }
    }

    /// New handle carrying the identifiers present in `ctx`
    ///
    /// `requestID`, `userID` and `traceID` become `request_id`, `user_id` and
    /// `trace_id`. Absent identifiers add nothing.
    pub fn with_context(&self, ctx: &RequestContext) -> Self {
        self.with_fields(ctx.log_fields())
    }

    /// New handle with `fields` merged in, overriding existing keys
    pub fn with_fields<I, K, V>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut merged = (*self.fields).clone();
        for (key, value) in fields {
            merged.insert(key.into(), value.into());
        }

        Self {
            backend: Arc::clone(&self.backend),
            fields: Arc::new(merged),
        }
    }

    /// New handle with one extra field
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_fields([(key.into(), value.into())])
    }

    /// Fields bound to this handle
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Whether a record at `severity` would be emitted
    pub fn enabled(&self, severity: Severity) -> bool {
        severity.is_terminal() || severity >= self.backend.threshold
    }

    /// The backend dispatcher, for routing plain `tracing` macros through the
    /// same sink, encoding and hooks
    pub fn dispatch(&self) -> &Dispatch {
        &self.backend.dispatch
    }

    /// Run `f` with this logger's backend as the thread's default subscriber
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.backend.dispatch, f)
    }

    /// Log `message` at error severity with the error's description attached
    /// as the `error` field
    pub fn error(&self, err: impl fmt::Display, message: &str) {
        self.emit(Severity::Error, message, Some(("error", err.to_string())));
    }

    pub fn error_with_context(&self, ctx: &RequestContext, err: impl fmt::Display, message: &str) {
        self.with_context(ctx).error(err, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(Severity::Info, message, None);
    }

    pub fn info_with_context(&self, ctx: &RequestContext, message: &str) {
        self.with_context(ctx).info(message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Severity::Warn, message, None);
    }

    pub fn debug(&self, message: &str) {
        self.emit(Severity::Debug, message, None);
    }

    pub fn trace(&self, message: &str) {
        self.emit(Severity::Trace, message, None);
    }

    /// Log `message` regardless of the configured level, flush the output and
    /// terminate the process with exit status 1.
    pub fn fatal(&self, message: &str) -> ! {
        self.emit(Severity::Fatal, message, None);
        self.backend.output.flush();
        std::process::exit(1)
    }

    /// Log `message` regardless of the configured level, then panic with it.
    ///
    /// The panic is meant to unwind to whatever top-level recovery the caller
    /// has; it is not a normal return path.
    pub fn panic(&self, message: &str) -> ! {
        self.emit(Severity::Panic, message, None);
        self.backend.output.flush();
        panic!("{}", message)
    }

    fn emit(&self, severity: Severity, message: &str, extra: Option<(&str, String)>) {
        if !self.enabled(severity) {
            return;
        }

        let encoded = match extra {
            Some((key, value)) => {
                let mut fields = (*self.fields).clone();
                fields.insert(key.to_string(), Value::from(value));
                serde_json::to_string(&fields)
            }
            None => serde_json::to_string(&*self.fields),
        }
        .unwrap_or_default();
        let bound = encoded.as_str();
        let level = severity.as_str();

        self.in_scope(|| match severity {
            Severity::Trace => {
                tracing::event!(target: TARGET, Level::TRACE, { beacon.severity = level, beacon.fields = bound }, "{}", message)
            }
            Severity::Debug => {
                tracing::event!(target: TARGET, Level::DEBUG, { beacon.severity = level, beacon.fields = bound }, "{}", message)
            }
            Severity::Info => {
                tracing::event!(target: TARGET, Level::INFO, { beacon.severity = level, beacon.fields = bound }, "{}", message)
            }
            Severity::Warn => {
                tracing::event!(target: TARGET, Level::WARN, { beacon.severity = level, beacon.fields = bound }, "{}", message)
            }
            Severity::Error | Severity::Fatal | Severity::Panic => {
                tracing::event!(target: TARGET, Level::ERROR, { beacon.severity = level, beacon.fields = bound }, "{}", message)
            }
        });
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("threshold", &self.backend.threshold)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Local host name; `None` when the platform lookup fails or yields nothing
fn resolve_hostname() -> Option<String> {
    let name = gethostname::gethostname().to_string_lossy().trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
