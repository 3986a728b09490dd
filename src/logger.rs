use crate::encode::{encode, format_timestamp};
use crate::filter::FieldFilter;
use crate::message::LogMessage;
use crate::sanitize::Sanitizer;
use crate::severity::Severity;
use crate::sink::{Sink, StderrSink};
use crate::tags::{self, TagScope};
use chrono::Utc;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_STACK_ID: AtomicU64 = AtomicU64::new(0);

/// The outward-facing logger: wraps a [`Sink`] and turns every call into
/// one sanitized, single-line JSON record.
///
/// Pure facade — no long-lived state beyond configuration. Each call
/// runs the full pipeline synchronously on the calling thread: level
/// gate, message parse, payload build, context/tag merge, encode, write.
/// A call never panics out to the caller; at worst the output degrades
/// to a fallback record with a synthesized `formatter_error`.
///
/// Derived loggers from [`Logger::tagged`] share the same sink but own
/// their tag configuration, so service-tagged loggers compose without
/// leaking into siblings.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Sink>,
    min_severity: Severity,
    sanitizer: Sanitizer,
    // Tags baked into this instance at creation, independent of the
    // ambient stack. Outer to inner: local tags come first.
    local_tags: Vec<String>,
    // Key into the thread-local ambient tag storage. Fresh per derived
    // instance, so siblings never observe each other's scopes.
    stack_id: u64,
}

fn next_stack_id() -> u64 {
    NEXT_STACK_ID.fetch_add(1, Ordering::Relaxed)
}

fn normalize_tags<I>(tags: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    tags.into_iter()
        .map(Into::into)
        .filter(|t| !t.is_empty())
        .collect()
}

impl Logger {
    /// Logger over `sink` with default settings: DEBUG threshold, no
    /// injected field filter, no tags.
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Builder::default().sink(sink).build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Active tags for this logger: instance-local tags first (outermost),
    /// then the ambient stack in push order.
    pub fn current_tags(&self) -> Vec<String> {
        let mut out = self.local_tags.clone();
        out.extend(tags::ambient_tags(self.stack_id));
        out
    }

    /// Derive a logger with `tags` baked in (non-block `tagged` form).
    ///
    /// The new logger wraps the same sink, keeps the parent's threshold
    /// and filter, and accumulates the parent's local tags. Its ambient
    /// tag stack is fresh — independent of the parent's and of any
    /// scopes currently active.
    pub fn tagged<I>(&self, tags: I) -> Logger
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut local_tags = self.local_tags.clone();
        local_tags.extend(normalize_tags(tags));
        Logger {
            sink: Arc::clone(&self.sink),
            min_severity: self.min_severity,
            sanitizer: self.sanitizer.clone(),
            local_tags,
            stack_id: next_stack_id(),
        }
    }

    /// Run `f` with `tags` pushed onto the ambient stack (block `tagged`
    /// form). The stack is restored afterwards on every exit path,
    /// panics included.
    pub fn tagged_scope<I, R>(&self, tags: I, f: impl FnOnce() -> R) -> R
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let _scope = self.tag_scope(tags);
        f()
    }

    /// Guard form of [`Logger::tagged_scope`], for callers that cannot
    /// wrap a closure (async blocks, early returns across functions).
    pub fn tag_scope<I>(&self, tags: I) -> TagScope
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        TagScope::enter(self.stack_id, &normalize_tags(tags))
    }

    /// Push tags onto the ambient stack without a scope; returns how
    /// many were pushed. Prefer the scoped forms.
    pub fn push_tags<I>(&self, tags: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        tags::push_tags(self.stack_id, &normalize_tags(tags))
    }

    /// Pop up to `n` tags from the end of the ambient stack, returning
    /// the entries actually removed. Never underflows.
    pub fn pop_tags(&self, n: usize) -> Vec<String> {
        tags::pop_tags(self.stack_id, n)
    }

    /// Log `msg` at `severity`. Never panics, never reports failure.
    pub fn log(&self, severity: Severity, msg: impl Into<LogMessage>) {
        if severity < self.min_severity {
            return;
        }
        self.emit(severity, &msg.into());
    }

    /// Lazy form: `f` runs only when `severity` passes the level gate,
    /// so expensive message construction is skipped for filtered calls.
    pub fn log_with<F>(&self, severity: Severity, f: F)
    where
        F: FnOnce() -> LogMessage,
    {
        if severity < self.min_severity {
            return;
        }
        let msg = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(msg) => msg,
            Err(_) => LogMessage::Rendered(crate::sanitize::UNPRINTABLE.to_string()),
        };
        self.emit(severity, &msg);
    }

    pub fn debug(&self, msg: impl Into<LogMessage>) {
        self.log(Severity::Debug, msg);
    }

    pub fn info(&self, msg: impl Into<LogMessage>) {
        self.log(Severity::Info, msg);
    }

    pub fn warn(&self, msg: impl Into<LogMessage>) {
        self.log(Severity::Warn, msg);
    }

    pub fn error(&self, msg: impl Into<LogMessage>) {
        self.log(Severity::Error, msg);
    }

    pub fn fatal(&self, msg: impl Into<LogMessage>) {
        self.log(Severity::Fatal, msg);
    }

    pub fn unknown(&self, msg: impl Into<LogMessage>) {
        self.log(Severity::Unknown, msg);
    }

    /// Log an error object at ERROR severity, capturing its type name,
    /// message, and source chain.
    pub fn report<E: std::error::Error + ?Sized>(&self, err: &E) {
        self.log(Severity::Error, LogMessage::from_error(err));
    }

    pub(crate) fn stack_id(&self) -> u64 {
        self.stack_id
    }

    fn emit(&self, severity: Severity, msg: &LogMessage) {
        let timestamp = format_timestamp(Utc::now());
        let active_tags = self.current_tags();
        // `encode` is total; the remaining hazard is the sink itself.
        let line = encode(&self.sanitizer, severity, &timestamp, &active_tags, msg);
        let _ = catch_unwind(AssertUnwindSafe(|| self.sink.write(&line)));
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_severity", &self.min_severity)
            .field("local_tags", &self.local_tags)
            .finish_non_exhaustive()
    }
}

/// Configuration for [`Logger`].
///
/// **Fields**
/// - `sink`: destination for finished lines; defaults to stderr.
/// - `min_severity`: calls below this are no-ops; defaults to DEBUG.
/// - `filter`: optional injected sensitive-field filter; when absent the
///   built-in pattern fallback applies.
/// - `tags`: service tags baked into the root logger.
#[derive(Default)]
pub struct Builder {
    sink: Option<Arc<dyn Sink>>,
    min_severity: Option<Severity>,
    filter: Option<Arc<dyn FieldFilter>>,
    tags: Vec<String>,
}

impl Builder {
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn field_filter(mut self, filter: Arc<dyn FieldFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.tags.extend(normalize_tags(tags));
        self
    }

    pub fn build(self) -> Logger {
        let sanitizer = match self.filter {
            Some(filter) => Sanitizer::with_filter(filter),
            None => Sanitizer::new(),
        };
        Logger {
            sink: self.sink.unwrap_or_else(|| Arc::new(StderrSink)),
            min_severity: self.min_severity.unwrap_or(Severity::Debug),
            sanitizer,
            local_tags: self.tags,
            stack_id: next_stack_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use serde_json::{json, Value};

    fn memory_logger() -> (Logger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::new(sink.clone() as Arc<dyn Sink>);
        (logger, sink)
    }

    fn parse_line(line: &str) -> Value {
        serde_json::from_str(line.trim_end()).expect("valid json line")
    }

    #[test]
    fn level_gate_skips_below_threshold() {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::builder()
            .sink(sink.clone() as Arc<dyn Sink>)
            .min_severity(Severity::Warn)
            .build();
        logger.debug("dropped");
        logger.info("dropped");
        logger.warn("kept");
        logger.fatal("kept");
        assert_eq!(sink.lines().len(), 2);
    }

    #[test]
    fn lazy_message_not_built_below_threshold() {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::builder()
            .sink(sink.clone() as Arc<dyn Sink>)
            .min_severity(Severity::Error)
            .build();
        let mut built = false;
        logger.log_with(Severity::Debug, || {
            built = true;
            LogMessage::from("never")
        });
        assert!(!built);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn derived_tagged_loggers_accumulate() {
        let (logger, sink) = memory_logger();
        let svc = logger.tagged(["svc"]).tagged(["env"]);
        svc.info("hello");
        let record = parse_line(&sink.lines()[0]);
        assert_eq!(record.get("tags"), Some(&json!(["svc", "env"])));
        // The parent logger is untouched.
        logger.info("plain");
        let record = parse_line(&sink.lines()[1]);
        assert!(record.get("tags").is_none());
    }

    #[test]
    fn tagged_scope_restores_after_panic() {
        let (logger, sink) = memory_logger();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            logger.tagged_scope(["X"], || panic!("bail"))
        }));
        assert!(result.is_err());
        logger.info("after");
        let record = parse_line(&sink.lines()[0]);
        assert!(record.get("tags").is_none());
    }

    #[test]
    fn derived_logger_scopes_do_not_leak_to_parent() {
        let (logger, sink) = memory_logger();
        let derived = logger.tagged(["svc"]);
        derived.tagged_scope(["req-1"], || {
            logger.info("parent");
            derived.info("derived");
        });
        let parent = parse_line(&sink.lines()[0]);
        assert!(parent.get("tags").is_none());
        let derived_record = parse_line(&sink.lines()[1]);
        assert_eq!(derived_record.get("tags"), Some(&json!(["svc", "req-1"])));
    }

    #[test]
    fn panicking_display_still_produces_a_line() {
        struct Exploding;
        impl std::fmt::Display for Exploding {
            fn fmt(&self, _f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                panic!("no display")
            }
        }
        let (logger, sink) = memory_logger();
        logger.info(LogMessage::display(Exploding));
        let record = parse_line(&sink.lines()[0]);
        assert_eq!(record.get("message"), Some(&json!("<unprintable>")));
    }

    #[test]
    fn report_logs_error_objects_at_error_severity() {
        let (logger, sink) = memory_logger();
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        logger.report(&err);
        let record = parse_line(&sink.lines()[0]);
        assert_eq!(record.get("severity"), Some(&json!("ERROR")));
        assert_eq!(record.pointer("/error/message"), Some(&json!("boom")));
    }

    #[test]
    fn panicking_sink_is_contained() {
        struct ExplodingSink;
        impl Sink for ExplodingSink {
            fn write(&self, _line: &str) -> std::io::Result<()> {
                panic!("sink died")
            }
        }
        let logger = Logger::new(Arc::new(ExplodingSink));
        logger.info("still fine");
    }
}
