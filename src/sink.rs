use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Destination for finished JSON lines.
///
/// Implementations own transport concerns (buffering, rotation,
/// broadcast); the logger only ever calls [`Sink::write`] with one
/// complete newline-terminated line per log call and never closes,
/// reopens, or reconfigures the destination. Errors are reported so
/// implementations can compose, but the logger absorbs them — a failing
/// sink never turns into an application failure.
pub trait Sink: Send + Sync {
    /// Write a single finished line, including its trailing newline.
    fn write(&self, line: &str) -> io::Result<()>;

    /// Flush buffered output, if the sink buffers. Default is a no-op.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Sink over any `Write` destination, serialized by a mutex so a single
/// line is written atomically with respect to other callers on this sink.
pub struct WriterSink<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { inner: Mutex::new(writer) }
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn write(&self, line: &str) -> io::Result<()> {
        lock_unpoisoned(&self.inner).write_all(line.as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        lock_unpoisoned(&self.inner).flush()
    }
}

/// Writes lines to standard error. The default sink.
#[derive(Clone, Copy, Default)]
pub struct StderrSink;

impl Sink for StderrSink {
    fn write(&self, line: &str) -> io::Result<()> {
        io::stderr().write_all(line.as_bytes())
    }
}

/// Writes lines to standard output.
#[derive(Clone, Copy, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn write(&self, line: &str) -> io::Result<()> {
        io::stdout().write_all(line.as_bytes())
    }
}

/// A sink that simply drops all lines.
///
/// Useful for measuring the overhead of payload construction itself
/// without any I/O, and for callers that want a logger wired up but
/// silenced.
#[derive(Clone, Copy, Default)]
pub struct NoopSink;

impl Sink for NoopSink {
    fn write(&self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory sink collecting every line, for tests and assertions.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    /// Copy of everything written so far.
    pub fn lines(&self) -> Vec<String> {
        lock_unpoisoned(&self.lines).clone()
    }

    /// Drain and return everything written so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *lock_unpoisoned(&self.lines))
    }
}

impl Sink for MemorySink {
    fn write(&self, line: &str) -> io::Result<()> {
        lock_unpoisoned(&self.lines).push(line.to_string());
        Ok(())
    }
}

/// Error type returned when resolving a sink target string.
#[derive(thiserror::Error, Debug)]
pub enum SinkTargetError {
    #[error("unknown or unsupported sink target scheme")]
    UnknownScheme,

    #[error("failed to open log file: {0}")]
    Io(#[from] io::Error),
}

/// Create a concrete [`Sink`] from a target string.
///
/// This is the main entry point for applications that want to select a
/// destination with a single configuration value instead of
/// constructing sinks manually.
///
/// Accepted targets:
/// - "stderr" (or "stderr:")
/// - "stdout" (or "stdout:")
/// - "null" (or "null:") — drop everything
/// - "file:///var/log/app.jsonl" — append to a file, created if missing
pub fn make_sink(target: &str) -> Result<Arc<dyn Sink>, SinkTargetError> {
    let trimmed = target.trim();
    let lower = trimmed.to_ascii_lowercase();
    match lower.trim_end_matches(':') {
        "stderr" => Ok(Arc::new(StderrSink)),
        "stdout" => Ok(Arc::new(StdoutSink)),
        "null" => Ok(Arc::new(NoopSink)),
        _ if lower.starts_with("file://") => {
            let path = &trimmed["file://".len()..];
            open_file_sink(Path::new(path))
        }
        _ => Err(SinkTargetError::UnknownScheme),
    }
}

fn open_file_sink(path: &Path) -> Result<Arc<dyn Sink>, SinkTargetError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Arc::new(WriterSink::new(file)))
}
