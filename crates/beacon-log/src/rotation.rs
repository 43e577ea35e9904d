//! Size-based log file rotation with retention and compression

use crate::{config::FileOutputConfig, Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const BACKUP_TIME_LEN: usize = 23;

/// A writer that rotates its file once it would grow past `max_size`
///
/// The active file keeps its configured name; rotated files are renamed to
/// `<stem>-<UTC timestamp>.<ext>`. After each rotation old backups are pruned
/// by count and age, and the rest are gzipped when `compress` is set.
/// Clones share the same file handle.
///
/// Retention runs after the file lock is released, so writers on other
/// threads keep going while a backup is being compressed. Retention passes
/// are serialized among themselves.
pub struct RotatingFileWriter {
    config: Arc<FileOutputConfig>,
    state: Arc<Mutex<FileState>>,
    retention: Arc<Mutex<()>>,
}

#[derive(Default)]
struct FileState {
    file: Option<File>,
    size: u64,
}

impl RotatingFileWriter {
    /// Create a writer; the file is opened lazily on first write
    pub fn new(config: FileOutputConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(FileState::default())),
            retention: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the active log file
    pub fn path(&self) -> &Path {
        &self.config.filename
    }

    /// Force a rotation, even when the active file is below the size limit
    pub fn rotate(&self) -> Result<()> {
        {
            let mut state = self.lock_state();
            self.rotate_locked(&mut state)?;
        }
        self.apply_retention();
        Ok(())
    }

    fn apply_retention(&self) {
        let _pass = self.retention.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = LogFileManager::apply_retention(&self.config) {
            eprintln!("Log retention failed: {}", e);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open_locked(&self, state: &mut FileState) -> Result<()> {
        let path = self.path();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        state.size = file.metadata()?.len();
        state.file = Some(file);
        Ok(())
    }

    fn rotate_locked(&self, state: &mut FileState) -> Result<()> {
        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }

        let current_path = self.path();
        if current_path.exists() {
            let backup_path = self.backup_path();
            std::fs::rename(current_path, &backup_path).map_err(|e| Error::Rotation {
                message: format!(
                    "Failed to rename {} to {}: {}",
                    current_path.display(),
                    backup_path.display(),
                    e
                ),
            })?;
        }

        state.size = 0;
        self.open_locked(state)
    }

    /// Unused name for the next backup; a sequence suffix breaks ties within
    /// the same millisecond
    fn backup_path(&self) -> PathBuf {
        let names = BackupNames::new(&self.config.filename);
        let timestamp = Utc::now().format(BACKUP_TIME_FORMAT).to_string();

        let mut candidate = names.path_for(&timestamp, 0);
        let mut sequence = 0;
        while candidate.exists() || names.compressed(&candidate).exists() {
            sequence += 1;
            candidate = names.path_for(&timestamp, sequence);
        }
        candidate
    }

    /// Bytes written and whether the file was rotated first
    fn write_locked(&self, state: &mut FileState, buf: &[u8]) -> Result<(usize, bool)> {
        if state.file.is_none() {
            self.open_locked(state)?;
        }

        let incoming = buf.len() as u64;
        let rotated = state.size > 0
            && state.size.saturating_add(incoming) > self.config.max_size_bytes();
        if rotated {
            self.rotate_locked(state)?;
        }

        let written = match state.file.as_mut() {
            Some(file) => file.write(buf)?,
            None => {
                return Err(Error::Rotation {
                    message: "No log file open".to_string(),
                })
            }
        };
        state.size += written as u64;

        Ok((written, rotated))
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = {
            let mut state = self.lock_state();
            self.write_locked(&mut state, buf)
        };

        match result {
            Ok((written, rotated)) => {
                if rotated {
                    self.apply_retention();
                }
                Ok(written)
            }
            Err(Error::Io(io_err)) => Err(io_err),
            Err(other) => Err(io::Error::new(io::ErrorKind::Other, other.to_string())),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.lock_state();
        if let Some(file) = state.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

impl Clone for RotatingFileWriter {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            state: Arc::clone(&self.state),
            retention: Arc::clone(&self.retention),
        }
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Naming scheme for backups of one log file
struct BackupNames {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl BackupNames {
    fn new(filename: &Path) -> Self {
        let dir = filename
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let stem = filename
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("log");
        let extension = filename
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        Self {
            dir,
            prefix: format!("{}-", stem),
            extension,
        }
    }

    fn path_for(&self, timestamp: &str, sequence: u32) -> PathBuf {
        let name = if sequence == 0 {
            format!("{}{}{}", self.prefix, timestamp, self.extension)
        } else {
            format!("{}{}-{}{}", self.prefix, timestamp, sequence, self.extension)
        };
        self.dir.join(name)
    }

    fn compressed(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".gz");
        PathBuf::from(name)
    }

    /// Backup timestamp and sequence encoded in `file_name`
    fn parse(&self, file_name: &str) -> Option<(DateTime<Utc>, u32)> {
        let rest = file_name.strip_prefix(&self.prefix)?;
        let rest = rest.strip_suffix(".gz").unwrap_or(rest);
        let rest = rest.strip_suffix(self.extension.as_str())?;

        let timestamp = rest.get(..BACKUP_TIME_LEN)?;
        let parsed = NaiveDateTime::parse_from_str(timestamp, BACKUP_TIME_FORMAT).ok()?;

        let sequence = match &rest[BACKUP_TIME_LEN..] {
            "" => 0,
            suffix => suffix.strip_prefix('-')?.parse().ok()?,
        };

        Some((parsed.and_utc(), sequence))
    }
}

/// Utility functions for rotated log files
pub struct LogFileManager;

impl LogFileManager {
    /// Backups of the configured log file, newest first
    pub fn find_backups(config: &FileOutputConfig) -> Result<Vec<LogFileInfo>> {
        let names = BackupNames::new(&config.filename);
        let dir = if names.dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            names.dir.clone()
        };

        let mut backups = Vec::new();
        if !dir.exists() {
            return Ok(backups);
        }

        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((rotated_at, sequence)) = names.parse(file_name) else {
                continue;
            };

            let metadata = entry.metadata()?;
            backups.push(LogFileInfo {
                path,
                size: metadata.len(),
                rotated_at,
                sequence,
            });
        }

        backups.sort_by(|a, b| {
            b.rotated_at
                .cmp(&a.rotated_at)
                .then(b.sequence.cmp(&a.sequence))
        });

        Ok(backups)
    }

    /// Prune backups beyond `max_backups` or older than `max_age` days, then
    /// gzip the survivors if compression is enabled
    pub fn apply_retention(config: &FileOutputConfig) -> Result<RetentionReport> {
        let mut report = RetentionReport::default();
        let mut backups = Self::find_backups(config)?;

        if config.max_backups > 0 && backups.len() > config.max_backups as usize {
            for stale in backups.split_off(config.max_backups as usize) {
                std::fs::remove_file(&stale.path)?;
                report.removed_by_count += 1;
            }
        }

        if config.max_age > 0 {
            let cutoff = Utc::now() - chrono::Duration::days(i64::from(config.max_age));
            let (kept, expired): (Vec<_>, Vec<_>) =
                backups.into_iter().partition(|b| b.rotated_at >= cutoff);
            for stale in expired {
                std::fs::remove_file(&stale.path)?;
                report.removed_by_age += 1;
            }
            backups = kept;
        }

        if config.compress {
            for backup in backups.iter().filter(|b| !b.is_compressed()) {
                Self::compress_log_file(&backup.path)?;
                report.compressed += 1;
            }
        }

        Ok(report)
    }

    /// Compress a log file using gzip, removing the original
    pub fn compress_log_file(file_path: &Path) -> Result<PathBuf> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::copy;

        let mut name = file_path.as_os_str().to_os_string();
        name.push(".gz");
        let compressed_path = PathBuf::from(name);

        let input_file = File::open(file_path)?;
        let output_file = File::create(&compressed_path)?;
        let mut encoder = GzEncoder::new(output_file, Compression::default());

        let mut reader = std::io::BufReader::new(input_file);
        copy(&mut reader, &mut encoder)?;
        encoder.finish()?;

        std::fs::remove_file(file_path)?;

        Ok(compressed_path)
    }
}

/// What one retention pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub removed_by_count: u32,
    pub removed_by_age: u32,
    pub compressed: u32,
}

/// Information about a rotated log file
#[derive(Debug, Clone)]
pub struct LogFileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub rotated_at: DateTime<Utc>,
    pub sequence: u32,
}

impl LogFileInfo {
    /// Check if this is a compressed log file
    pub fn is_compressed(&self) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "gz")
            .unwrap_or(false)
    }
}
