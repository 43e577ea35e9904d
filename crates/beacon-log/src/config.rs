//! Logger configuration

use crate::{hooks::Hook, sink::Sink, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::Level;

/// Environment name that selects the human-readable text encoding
pub const DEVELOPMENT: &str = "development";

/// Main logger configuration
///
/// A plain value object. Nothing here is validated by [`crate::Logger::new`];
/// a malformed file configuration surfaces when the file sink first writes.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Business unit owning the service
    pub business: String,

    /// Service name
    pub service: String,

    /// Service version
    pub version: String,

    /// Deployment environment; "development" selects text output, anything
    /// else selects JSON
    pub environment: String,

    /// Minimum severity emitted
    pub level: Severity,

    /// Custom sink, takes priority over `file_output`
    #[serde(skip)]
    pub output: Option<Sink>,

    /// Size-rotated file output
    pub file_output: Option<FileOutputConfig>,

    /// Extension points invoked, in order, on every emission
    #[serde(skip)]
    pub hooks: Vec<Arc<dyn Hook>>,
}

/// Rotating file sink parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// Path of the active log file
    pub filename: PathBuf,

    /// Maximum size in megabytes before rotation (0 means 100)
    pub max_size: u64,

    /// Maximum number of rotated files to keep (0 keeps all)
    pub max_backups: u32,

    /// Maximum age of rotated files in days (0 disables age pruning)
    pub max_age: u32,

    /// Gzip rotated files
    pub compress: bool,
}

/// Record severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Severity {
    /// Every severity, least severe first
    pub const ALL: [Severity; 7] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
        Severity::Panic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Panic => "panic",
        }
    }

    /// Fatal and panic records bypass the configured threshold
    pub fn is_terminal(&self) -> bool {
        matches!(self, Severity::Fatal | Severity::Panic)
    }
}

impl From<Severity> for Level {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Trace => Level::TRACE,
            Severity::Debug => Level::DEBUG,
            Severity::Info => Level::INFO,
            Severity::Warn => Level::WARN,
            Severity::Error | Severity::Fatal | Severity::Panic => Level::ERROR,
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        if level == Level::TRACE {
            Severity::Trace
        } else if level == Level::DEBUG {
            Severity::Debug
        } else if level == Level::INFO {
            Severity::Info
        } else if level == Level::WARN {
            Severity::Warn
        } else {
            Severity::Error
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            "panic" => Ok(Severity::Panic),
            other => Err(Error::Config {
                message: format!("Unknown log level '{}'", other),
            }),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            business: String::new(),
            service: String::new(),
            version: String::new(),
            environment: DEVELOPMENT.to_string(),
            level: Severity::Info,
            output: None,
            file_output: None,
            hooks: Vec::new(),
        }
    }
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::new(),
            max_size: 0,
            max_backups: 0,
            max_age: 0,
            compress: false,
        }
    }
}

impl FileOutputConfig {
    /// Rotation threshold in bytes
    pub fn max_size_bytes(&self) -> u64 {
        let megabytes = if self.max_size == 0 { 100 } else { self.max_size };
        megabytes.saturating_mul(1024 * 1024)
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("business", &self.business)
            .field("service", &self.service)
            .field("version", &self.version)
            .field("environment", &self.environment)
            .field("level", &self.level)
            .field("output", &self.output)
            .field("file_output", &self.file_output)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl LoggerConfig {
    /// Default configuration carrying the given identity
    pub fn for_service(business: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            business: business.into(),
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: Sink) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_file_output(mut self, file_output: FileOutputConfig) -> Self {
        self.file_output = Some(file_output);
        self
    }

    pub fn with_hook(mut self, hook: impl Hook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Whether records are rendered as human-readable text
    pub fn is_development(&self) -> bool {
        self.environment == DEVELOPMENT
    }

    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config {
            message: format!("Failed to parse logger config {}: {}", path.display(), e),
        })
    }

    /// Save the serializable part of the configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: format!("Failed to serialize logger config: {}", e),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `BEACON_*` environment variable overrides
    pub fn load_env_overrides(&mut self) {
        if let Ok(business) = std::env::var("BEACON_BUSINESS") {
            self.business = business;
        }
        if let Ok(service) = std::env::var("BEACON_SERVICE") {
            self.service = service;
        }
        if let Ok(version) = std::env::var("BEACON_VERSION") {
            self.version = version;
        }
        if let Ok(environment) = std::env::var("BEACON_ENVIRONMENT") {
            self.environment = environment;
        }

        if let Ok(level) = std::env::var("BEACON_LOG_LEVEL") {
            self.level = level.parse().unwrap_or(self.level);
        }

        if let Ok(filename) = std::env::var("BEACON_LOG_FILE") {
            self.file_output
                .get_or_insert_with(FileOutputConfig::default)
                .filename = PathBuf::from(filename);
        }
    }
}
