//! Extension points fired on every emission

use crate::{
    config::Severity,
    formatters::{record_object, EventVisitor},
    logger::Fields,
    sink::Sink,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use tracing::{Event, Subscriber};
use tracing_subscriber::{fmt::MakeWriter, layer::Context, Layer};

/// What a hook observes for one emitted record
#[derive(Debug, Clone)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub target: String,
    pub message: String,
    pub fields: Fields,
}

impl Record {
    pub(crate) fn from_event(event: &Event<'_>) -> Self {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        Self {
            timestamp: Utc::now(),
            severity: visitor
                .severity
                .unwrap_or_else(|| Severity::from(*metadata.level())),
            target: metadata.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        }
    }

    /// Field lookup by name
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Same object the JSON encoding writes: timestamp, level, message and
    /// fields, with reserved field names moved to `fields.<key>`
    pub fn to_json(&self) -> Value {
        record_object(
            self.timestamp,
            self.severity,
            &self.message,
            self.fields.clone(),
        )
    }
}

/// Extension point attached to a logger at construction
///
/// Hooks run synchronously, in registration order, before the record is
/// written. A failing hook is reported on stderr and does not stop the other
/// hooks or the write.
pub trait Hook: Send + Sync {
    /// Severities this hook fires for
    fn levels(&self) -> &[Severity] {
        &Severity::ALL
    }

    fn fire(&self, record: &Record) -> anyhow::Result<()>;
}

/// Hook backed by a closure
pub struct FnHook<F> {
    levels: Vec<Severity>,
    f: F,
}

/// Build a hook firing `f` for every severity
pub fn from_fn<F>(f: F) -> FnHook<F>
where
    F: Fn(&Record) -> anyhow::Result<()> + Send + Sync,
{
    FnHook {
        levels: Severity::ALL.to_vec(),
        f,
    }
}

impl<F> FnHook<F> {
    /// Restrict the hook to the given severities
    pub fn with_levels(mut self, levels: &[Severity]) -> Self {
        self.levels = levels.to_vec();
        self
    }
}

impl<F> Hook for FnHook<F>
where
    F: Fn(&Record) -> anyhow::Result<()> + Send + Sync,
{
    fn levels(&self) -> &[Severity] {
        &self.levels
    }

    fn fire(&self, record: &Record) -> anyhow::Result<()> {
        (self.f)(record)
    }
}

/// Copies records at the chosen severities to a second sink as JSON lines
pub struct WriterHook {
    sink: Sink,
    levels: Vec<Severity>,
}

impl WriterHook {
    pub fn new(sink: Sink, levels: &[Severity]) -> Self {
        Self {
            sink,
            levels: levels.to_vec(),
        }
    }
}

impl Hook for WriterHook {
    fn levels(&self) -> &[Severity] {
        &self.levels
    }

    fn fire(&self, record: &Record) -> anyhow::Result<()> {
        let line = serde_json::to_string(&record.to_json())?;
        let mut writer = self.sink.make_writer();
        writeln!(writer, "{}", line)?;
        Ok(())
    }
}

/// Layer that dispatches every event to the configured hooks
pub(crate) struct HookLayer {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookLayer {
    pub(crate) fn new(hooks: Vec<Arc<dyn Hook>>) -> Option<Self> {
        if hooks.is_empty() {
            None
        } else {
            Some(Self { hooks })
        }
    }
}

impl<S> Layer<S> for HookLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let record = Record::from_event(event);

        for hook in &self.hooks {
            if !hook.levels().contains(&record.severity) {
                continue;
            }
            if let Err(e) = hook.fire(&record) {
                eprintln!("Failed to fire hook: {}", e);
            }
        }
    }
}
