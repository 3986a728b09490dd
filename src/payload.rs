use crate::message::LogMessage;
use crate::parse::parse;
use crate::sanitize::{sanitize_str, Sanitizer};
use crate::severity::Severity;
use serde_json::{Map, Value};

/// Keys the system computes itself. Identically named keys arriving via
/// ambient context are dropped before merge so user data can never shadow
/// them or inject a spurious nested `context`.
pub(crate) const RESERVED_KEYS: [&str; 5] = ["severity", "timestamp", "tags", "message", "context"];

/// Build the base payload for one call: parsed message merged at the
/// root (mappings) or under `message` (everything else), with `severity`
/// and `timestamp` always system-computed — a message-supplied key of
/// either name is discarded.
pub fn build_base(
    sanitizer: &Sanitizer,
    msg: &LogMessage,
    severity: Severity,
    timestamp: &str,
) -> Map<String, Value> {
    let parsed = parse(sanitizer, msg);
    let mut payload = Map::new();
    payload.insert("severity".to_string(), Value::String(severity.as_str().to_string()));
    payload.insert("timestamp".to_string(), Value::String(timestamp.to_string()));
    match parsed {
        Value::Object(entries) => {
            for (key, value) in entries {
                if key == "severity" || key == "timestamp" {
                    continue;
                }
                payload.insert(key, value);
            }
        }
        other => {
            payload.insert("message".to_string(), other);
        }
    }
    payload
}

fn tag_text(value: &Value) -> String {
    match value {
        Value::String(s) => sanitize_str(s),
        other => sanitize_str(&other.to_string()),
    }
}

fn push_unique(tags: &mut Vec<String>, tag: String) {
    if !tag.is_empty() && !tags.contains(&tag) {
        tags.push(tag);
    }
}

/// Merge ambient context and the active tag stack into `payload`,
/// applying the precedence rules:
///
/// 1. ambient context is sanitized (empty or non-mapping input counts
///    as empty);
/// 2. system-controlled keys are dropped from it;
/// 3. keys already present at the payload root win — ambient context
///    only fills gaps;
/// 4. a `context` submap supplied by the message itself wins over
///    ambient context on key conflicts;
/// 5. tags are the logger's stack unioned with a message-level `tags`
///    array, first occurrence kept, always at the payload root;
/// 6. empty `tags` / `context` are omitted entirely.
pub fn merge_context(
    payload: &mut Map<String, Value>,
    sanitizer: &Sanitizer,
    ambient: Map<String, Value>,
    active_tags: &[String],
) {
    let mut context = if ambient.is_empty() {
        Map::new()
    } else {
        sanitizer.sanitize_map(&ambient)
    };

    for key in RESERVED_KEYS {
        context.shift_remove(key);
    }
    context.retain(|key, _| !payload.contains_key(key));

    // Message-level context entries overwrite ambient ones.
    if let Some(Value::Object(own)) = payload.get("context") {
        for (key, value) in own.clone() {
            context.insert(key, value);
        }
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in active_tags {
        push_unique(&mut tags, sanitize_str(tag));
    }
    match payload.get("tags") {
        Some(Value::Array(own)) => {
            for tag in own.clone() {
                push_unique(&mut tags, tag_text(&tag));
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => {
            let own = other.clone();
            push_unique(&mut tags, tag_text(&own));
        }
    }

    payload.shift_remove("tags");
    if !tags.is_empty() {
        payload.insert(
            "tags".to_string(),
            Value::Array(tags.into_iter().map(Value::String).collect()),
        );
    }

    payload.shift_remove("context");
    if !context.is_empty() {
        payload.insert("context".to_string(), Value::Object(context));
    }
}
