use json_line_logger::{Logger, StdoutSink};
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn main() {
    // With no injected filter, the built-in pattern fallback drops
    // sensitive keys and adds `<key>_filtered` markers.
    let fallback = Logger::new(Arc::new(StdoutSink));
    fallback.info(json!({
        "user": "alice",
        "password": "hunter2",
        "ApiToken": "tok_123",
    }));

    // An injected filter replaces values in place and keeps the keys,
    // the way host-framework parameter filtering behaves.
    let mask = |mut fields: Map<String, Value>| {
        for key in ["password", "card_number"] {
            if fields.contains_key(key) {
                fields.insert(key.to_string(), json!("[FILTERED]"));
            }
        }
        fields
    };
    let injected = Logger::builder()
        .sink(Arc::new(StdoutSink))
        .field_filter(Arc::new(mask))
        .build();
    injected.info(json!({
        "user": "bob",
        "password": "tiger",
        "card_number": "4111111111111111",
    }));
}
