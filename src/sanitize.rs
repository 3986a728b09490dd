use crate::filter::{is_sensitive_key, snake_case, FieldFilter};
use crate::message::ErrorDetails;
use serde_json::{json, Map, Value};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Maximum length of any sanitized string, in characters.
pub const MAX_STRING_LEN: usize = 10_000;

/// Maximum recursion depth for nested structures.
pub const MAX_DEPTH: usize = 10;

/// Maximum number of entries kept in a mapping or sequence.
pub const MAX_COLLECTION_LEN: usize = 50;

/// Maximum number of backtrace frames kept for an error object.
pub const MAX_BACKTRACE_FRAMES: usize = 20;

/// Suffix appended to over-length strings after truncation.
pub const TRUNCATION_SUFFIX: &str = "...[truncated]";

/// Trailing element appended to over-length sequences.
pub const TRUNCATED_ELEMENT: &str = "[truncated]";

/// Replacement value for sensitive fields.
pub const FILTERED: &str = "[FILTERED]";

/// Placeholder for values whose string conversion failed.
pub const UNPRINTABLE: &str = "<unprintable>";

/// Placeholder for strings that could not be sanitized at all.
pub const SANITIZATION_ERROR: &str = "<sanitization_error>";

fn is_control(c: char) -> bool {
    (c as u32) < 0x20 || c as u32 == 0x7f
}

/// Strip control characters (0x00–0x1F, 0x7F) and cap the result at
/// [`MAX_STRING_LEN`] characters, appending `...[truncated]` when the cap
/// was hit. Total: never fails, and is idempotent for strings that were
/// already within the limits.
pub fn sanitize_str(s: &str) -> String {
    let cleaned: String = s.chars().filter(|c| !is_control(*c)).collect();
    match cleaned.char_indices().nth(MAX_STRING_LEN) {
        Some((byte_idx, _)) => {
            let mut out = cleaned[..byte_idx].to_string();
            out.push_str(TRUNCATION_SUFFIX);
            out
        }
        None => cleaned,
    }
}

/// Best-effort `Display` rendering of a foreign value. A panicking
/// `Display` impl yields `<unprintable>`, a panicking char iterator
/// yields `<sanitization_error>`; either way the caller gets a safe,
/// sanitized string.
pub(crate) fn best_effort_string(value: &dyn fmt::Display) -> String {
    match catch_unwind(AssertUnwindSafe(|| value.to_string())) {
        Ok(raw) => match catch_unwind(AssertUnwindSafe(|| sanitize_str(&raw))) {
            Ok(clean) => clean,
            Err(_) => SANITIZATION_ERROR.to_string(),
        },
        Err(_) => UNPRINTABLE.to_string(),
    }
}

/// Recursive value sanitizer enforcing the depth, size, and string limits
/// and applying sensitive-field filtering along the way.
///
/// Holds the optionally injected [`FieldFilter`]; when none is set, the
/// pattern fallback from [`crate::filter`] applies. Cloning is cheap — the
/// filter is shared behind an `Arc`.
#[derive(Clone, Default)]
pub struct Sanitizer {
    filter: Option<Arc<dyn FieldFilter>>,
}

impl Sanitizer {
    pub fn new() -> Self {
        Sanitizer { filter: None }
    }

    /// Build a sanitizer that delegates sensitive-field handling to an
    /// injected filter. The filter replaces values in place and keeps
    /// keys present, unlike the pattern fallback.
    pub fn with_filter(filter: Arc<dyn FieldFilter>) -> Self {
        Sanitizer { filter: Some(filter) }
    }

    /// Sanitize an arbitrary JSON value.
    ///
    /// **Returns**
    /// - strings stripped and capped per [`sanitize_str`]
    /// - mappings capped at [`MAX_COLLECTION_LEN`] entries (plus a
    ///   `_truncated: true` marker), filtered, values recursed
    /// - sequences capped at [`MAX_COLLECTION_LEN`] elements (plus a
    ///   trailing `"[truncated]"` marker), elements recursed
    /// - numbers, booleans and null passed through unchanged
    /// - anything nested beyond [`MAX_DEPTH`] replaced by
    ///   `{"error": "max_depth_exceeded"}`
    pub fn sanitize(&self, value: &Value) -> Value {
        self.sanitize_at(value, 0)
    }

    pub(crate) fn sanitize_at(&self, value: &Value, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            return json!({ "error": "max_depth_exceeded" });
        }
        match value {
            Value::String(s) => Value::String(sanitize_str(s)),
            Value::Object(map) => self.sanitize_map_at(map, depth),
            Value::Array(items) => {
                let mut out: Vec<Value> = items
                    .iter()
                    .take(MAX_COLLECTION_LEN)
                    .map(|item| self.sanitize_at(item, depth + 1))
                    .collect();
                if items.len() > MAX_COLLECTION_LEN {
                    out.push(Value::String(TRUNCATED_ELEMENT.to_string()));
                }
                Value::Array(out)
            }
            other => other.clone(),
        }
    }

    /// Sanitize a top-level mapping. Returns the sanitized entries, or a
    /// single `{"sanitization_error": true}` entry if the mapping could
    /// not be processed (e.g. a panicking injected filter).
    pub fn sanitize_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        match self.sanitize_map_at(map, 0) {
            Value::Object(entries) => entries,
            // sanitize_map_at only ever returns an object, but keep the
            // recovery total rather than panicking on the impossible arm.
            _ => error_map(),
        }
    }

    fn sanitize_map_at(&self, map: &Map<String, Value>, depth: usize) -> Value {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.sanitize_map_inner(map, depth)));
        match outcome {
            Ok(entries) => Value::Object(entries),
            Err(_) => Value::Object(error_map()),
        }
    }

    fn sanitize_map_inner(&self, map: &Map<String, Value>, depth: usize) -> Map<String, Value> {
        let truncated = map.len() > MAX_COLLECTION_LEN;
        let limited: Map<String, Value> = map
            .iter()
            .take(MAX_COLLECTION_LEN)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut out = Map::new();
        if let Some(filter) = &self.filter {
            // Injected path: the filter sees the size-limited mapping
            // first, then every surviving value recurses.
            for (key, value) in filter.filter(limited) {
                out.insert(key, self.sanitize_at(&value, depth + 1));
            }
        } else {
            for (key, value) in limited {
                if is_sensitive_key(&key) {
                    let marker = format!("{}_filtered", snake_case(&key));
                    out.insert(marker, Value::String(FILTERED.to_string()));
                } else {
                    let sanitized = self.sanitize_at(&value, depth + 1);
                    out.insert(key, sanitized);
                }
            }
        }
        if truncated {
            out.insert("_truncated".to_string(), Value::Bool(true));
        }
        out
    }

    /// Render an error object as `{"error": {class, message, backtrace}}`.
    pub fn sanitize_error(&self, details: &ErrorDetails) -> Value {
        json!({
            "error": {
                "class": sanitize_str(&details.class),
                "message": sanitize_str(&details.message),
                "backtrace": sanitize_backtrace(&details.backtrace),
            }
        })
    }
}

fn error_map() -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("sanitization_error".to_string(), Value::Bool(true));
    out
}

/// Keep the first [`MAX_BACKTRACE_FRAMES`] frames, each sanitized as a
/// string. Any failure while rendering yields an empty backtrace.
pub fn sanitize_backtrace(frames: &[String]) -> Vec<Value> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        frames
            .iter()
            .take(MAX_BACKTRACE_FRAMES)
            .map(|frame| Value::String(sanitize_str(frame)))
            .collect::<Vec<Value>>()
    }));
    outcome.unwrap_or_default()
}
