use crate::sanitize::best_effort_string;
use serde_json::{Map, Value};
use std::error::Error as StdError;

/// A log call's payload, classified at the API boundary.
///
/// The logger accepts strings, structured mappings, arbitrary JSON
/// values, error objects, and opaque displayable values; each variant
/// takes a different path through the parser (see [`crate::parse`]).
#[derive(Debug, Clone)]
pub enum LogMessage {
    /// Plain text. Strings that look like JSON (`{..}` or `[..]`) are
    /// parsed and treated as structured data by the parser.
    Text(String),
    /// Structured mapping; its keys end up at the payload root.
    Map(Map<String, Value>),
    /// Arbitrary JSON value (objects behave like [`LogMessage::Map`]).
    Value(Value),
    /// An error object rendered as `{"error": {class, message, backtrace}}`.
    Error(ErrorDetails),
    /// Pre-rendered text from an opaque `Display` value. Never JSON-parsed.
    Rendered(String),
}

/// Captured view of an error: type name, message, and the `source()`
/// chain rendered as backtrace frames.
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub class: String,
    pub message: String,
    pub backtrace: Vec<String>,
}

impl LogMessage {
    /// Capture an error object, following its `source()` chain.
    ///
    /// The error's own `Display` output and every source's are rendered
    /// best-effort; a panicking impl degrades to a placeholder rather
    /// than escaping the logging call.
    pub fn from_error<E: StdError + ?Sized>(err: &E) -> LogMessage {
        let mut backtrace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            backtrace.push(best_effort_string(&cause));
            source = cause.source();
        }
        LogMessage::Error(ErrorDetails {
            class: std::any::type_name::<E>().to_string(),
            message: best_effort_string(&err),
            backtrace,
        })
    }

    /// Capture any displayable value via best-effort stringification.
    /// The result is treated as opaque text, not candidate JSON.
    pub fn display<T: std::fmt::Display>(value: T) -> LogMessage {
        LogMessage::Rendered(best_effort_string(&value))
    }
}

impl From<&str> for LogMessage {
    fn from(s: &str) -> Self {
        LogMessage::Text(s.to_string())
    }
}

impl From<String> for LogMessage {
    fn from(s: String) -> Self {
        LogMessage::Text(s)
    }
}

impl From<Map<String, Value>> for LogMessage {
    fn from(map: Map<String, Value>) -> Self {
        LogMessage::Map(map)
    }
}

impl From<Value> for LogMessage {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => LogMessage::Map(map),
            other => LogMessage::Value(other),
        }
    }
}

impl From<ErrorDetails> for LogMessage {
    fn from(details: ErrorDetails) -> Self {
        LogMessage::Error(details)
    }
}
