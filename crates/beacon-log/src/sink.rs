//! Output sinks for log records

use serde_json::Value;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Destination for rendered log records
///
/// Custom writers are serialized behind a mutex, one record per lock.
#[derive(Clone)]
pub enum Sink {
    Stdout,
    Stderr,
    Writer(SharedWriter),
}

impl Sink {
    pub fn stdout() -> Self {
        Sink::Stdout
    }

    pub fn stderr() -> Self {
        Sink::Stderr
    }

    /// Wrap any writer as a sink
    pub fn writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Sink::Writer(Arc::new(Mutex::new(Box::new(writer))))
    }
}

impl Default for Sink {
    fn default() -> Self {
        Sink::Stderr
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Stdout => f.write_str("Sink::Stdout"),
            Sink::Stderr => f.write_str("Sink::Stderr"),
            Sink::Writer(_) => f.write_str("Sink::Writer(..)"),
        }
    }
}

/// Writer handed out per record by [`Sink`]
pub enum SinkWriter<'a> {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    Shared(MutexGuard<'a, Box<dyn Write + Send>>),
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SinkWriter::Stdout(out) => out.write(buf),
            SinkWriter::Stderr(err) => err.write(buf),
            SinkWriter::Shared(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SinkWriter::Stdout(out) => out.flush(),
            SinkWriter::Stderr(err) => err.flush(),
            SinkWriter::Shared(writer) => writer.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for Sink {
    type Writer = SinkWriter<'a>;

    fn make_writer(&'a self) -> SinkWriter<'a> {
        match self {
            Sink::Stdout => SinkWriter::Stdout(io::stdout()),
            Sink::Stderr => SinkWriter::Stderr(io::stderr()),
            // A panic while holding the lock leaves the buffer usable
            Sink::Writer(shared) => {
                SinkWriter::Shared(shared.lock().unwrap_or_else(|e| e.into_inner()))
            }
        }
    }
}

/// In-memory writer whose clones share one buffer
///
/// Handy as a custom sink when records need to be inspected, e.g. in tests.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Lines that parse as JSON objects
    pub fn json_records(&self) -> Vec<Value> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter(Value::is_object)
            .collect()
    }

    pub fn clear(&self) {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// A sink writing into this buffer
    pub fn sink(&self) -> Sink {
        Sink::writer(self.clone())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_buffer_clones_share_contents() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();

        writer.write_all(b"{\"a\":1}\nplain text\n").unwrap();

        assert_eq!(buffer.lines().len(), 2);
        assert_eq!(buffer.json_records().len(), 1);

        buffer.clear();
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_sink_writer_routes_to_custom_writer() {
        let buffer = SharedBuffer::new();
        let sink = buffer.sink();

        sink.make_writer().write_all(b"hello").unwrap();
        sink.make_writer().write_all(b" world").unwrap();

        assert_eq!(buffer.contents(), "hello world");
    }
}
