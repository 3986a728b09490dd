use crate::message::LogMessage;
use crate::sanitize::{sanitize_str, Sanitizer};
use serde_json::Value;

/// JSON-looking heuristic: braces or brackets on both ends, nothing
/// else. Leading or trailing whitespace disqualifies the match on
/// purpose — only strings that were clearly produced as JSON get the
/// parse attempt.
pub(crate) fn looks_like_json(s: &str) -> bool {
    (s.starts_with('{') && s.ends_with('}')) || (s.starts_with('[') && s.ends_with(']'))
}

/// Normalize a log message into a sanitized value: a mapping when the
/// input was structured, a sanitized scalar otherwise.
///
/// Pure: no side effects, the result feeds straight into the payload
/// builder. Malformed JSON-looking strings fall back to plain string
/// sanitization rather than erroring.
pub fn parse(sanitizer: &Sanitizer, msg: &LogMessage) -> Value {
    match msg {
        LogMessage::Map(map) => Value::Object(sanitizer.sanitize_map(map)),
        LogMessage::Text(s) => {
            if looks_like_json(s) {
                match serde_json::from_str::<Value>(s) {
                    Ok(parsed) => sanitizer.sanitize(&parsed),
                    Err(_) => Value::String(sanitize_str(s)),
                }
            } else {
                Value::String(sanitize_str(s))
            }
        }
        LogMessage::Error(details) => sanitizer.sanitize_error(details),
        LogMessage::Value(value) => sanitizer.sanitize(value),
        LogMessage::Rendered(s) => Value::String(sanitize_str(s)),
    }
}
