use crate::context::current_context;
use crate::message::LogMessage;
use crate::payload::{build_base, merge_context};
use crate::sanitize::{best_effort_string, sanitize_str, Sanitizer, UNPRINTABLE};
use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// ISO-8601 UTC with microsecond precision, e.g.
/// `2020-01-15T14:30:45.123456Z`.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Synthesized description of a build/encode failure, attached to the
/// fallback record.
#[derive(Debug, Clone, Serialize)]
pub struct FormatterError {
    pub class: String,
    pub message: String,
}

/// Minimal safe record emitted when normal payload construction fails.
/// Carries nothing beyond a best-effort string of the original input.
#[derive(Debug, Serialize)]
struct FallbackRecord<'a> {
    timestamp: &'a str,
    severity: &'a str,
    message: String,
    formatter_error: FormatterError,
}

fn panic_text(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn best_effort_message(msg: &LogMessage) -> String {
    match msg {
        LogMessage::Text(s) | LogMessage::Rendered(s) => sanitize_str(s),
        LogMessage::Error(details) => sanitize_str(&details.message),
        LogMessage::Map(map) => serde_json::to_string(map)
            .map(|s| sanitize_str(&s))
            .unwrap_or_else(|_| UNPRINTABLE.to_string()),
        LogMessage::Value(value) => best_effort_string(value),
    }
}

fn drop_null_entries(payload: &mut Map<String, Value>) {
    payload.retain(|_, value| !value.is_null());
}

/// Serialize one log call to a single newline-terminated JSON line.
///
/// Builds the payload (message parse, severity, timestamp), attaches the
/// ambient context (null-valued entries compacted away first) and the
/// active tag stack, then encodes. Total: any panic or serialization
/// failure along the way degrades to the fallback record, which is
/// itself guaranteed to encode.
pub fn encode(
    sanitizer: &Sanitizer,
    severity: Severity,
    timestamp: &str,
    active_tags: &[String],
    msg: &LogMessage,
) -> String {
    let built = catch_unwind(AssertUnwindSafe(|| {
        let mut payload = build_base(sanitizer, msg, severity, timestamp);
        let mut ambient = current_context();
        ambient.retain(|_, value| !value.is_null());
        merge_context(&mut payload, sanitizer, ambient, active_tags);
        drop_null_entries(&mut payload);
        serde_json::to_string(&payload)
    }));

    match built {
        Ok(Ok(line)) => line + "\n",
        Ok(Err(err)) => fallback_line(
            severity,
            timestamp,
            msg,
            FormatterError {
                class: "serde_json::Error".to_string(),
                message: sanitize_str(&err.to_string()),
            },
        ),
        Err(panic) => fallback_line(
            severity,
            timestamp,
            msg,
            FormatterError {
                class: "panic".to_string(),
                message: sanitize_str(&panic_text(panic)),
            },
        ),
    }
}

/// Encode the fallback record. Last line of defense: if even this
/// fails to serialize, a hand-assembled line with fixed-safe fields
/// goes out instead.
pub(crate) fn fallback_line(
    severity: Severity,
    timestamp: &str,
    msg: &LogMessage,
    formatter_error: FormatterError,
) -> String {
    let record = FallbackRecord {
        timestamp,
        severity: severity.as_str(),
        message: best_effort_message(msg),
        formatter_error,
    };
    match serde_json::to_string(&record) {
        Ok(line) => line + "\n",
        Err(_) => format!(
            "{{\"timestamp\":{},\"severity\":\"{}\",\"message\":\"<encoding_failed>\"}}\n",
            serde_json::Value::String(timestamp.to_string()),
            severity.as_str(),
        ),
    }
}
