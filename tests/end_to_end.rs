use json_line_logger::{with_context, Logger, LogMessage, MemorySink, Sink};
use serde_json::{json, Value};
use std::sync::Arc;

fn memory_logger() -> (Logger, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let logger = Logger::new(sink.clone() as Arc<dyn Sink>);
    (logger, sink)
}

fn single_record(sink: &MemorySink) -> Value {
    let lines = sink.lines();
    assert_eq!(lines.len(), 1, "expected exactly one line, got {lines:?}");
    let line = &lines[0];
    assert!(line.ends_with('\n'));
    assert_eq!(line.matches('\n').count(), 1, "single-line output");
    serde_json::from_str(line.trim_end()).expect("valid json")
}

#[test]
fn plain_message_produces_minimal_record() {
    let (logger, sink) = memory_logger();
    logger.info("hello");

    let record = single_record(&sink);
    assert_eq!(record.get("message"), Some(&json!("hello")));
    assert_eq!(record.get("severity"), Some(&json!("INFO")));
    let timestamp = record
        .get("timestamp")
        .and_then(Value::as_str)
        .expect("timestamp");
    // ^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{6}Z$
    assert_eq!(timestamp.len(), 27);
    assert!(timestamp.ends_with('Z'));
    assert_eq!(&timestamp[4..5], "-");
    assert_eq!(&timestamp[10..11], "T");
    assert_eq!(&timestamp[19..20], ".");
    assert!(timestamp[20..26].chars().all(|c| c.is_ascii_digit()));
    assert!(record.get("tags").is_none());
    assert!(record.get("context").is_none());
}

#[test]
fn tagged_scope_attaches_tags_in_order() {
    let (logger, sink) = memory_logger();
    logger.tagged_scope(["REQUEST", "123"], || {
        logger.info("processing");
    });

    let record = single_record(&sink);
    assert_eq!(record.get("tags"), Some(&json!(["REQUEST", "123"])));
}

#[test]
fn context_and_tags_combine_on_structured_messages() {
    let (logger, sink) = memory_logger();
    logger.tagged_scope(["REQUEST"], || {
        with_context(json!({ "user_id": 42 }), || {
            logger.warn(json!({ "event": "slow_query" }));
        });
    });

    let record = single_record(&sink);
    assert_eq!(record.get("event"), Some(&json!("slow_query")));
    assert_eq!(record.pointer("/context/user_id"), Some(&json!(42)));
    assert_eq!(record.get("tags"), Some(&json!(["REQUEST"])));
    assert_eq!(record.get("severity"), Some(&json!("WARN")));
}

#[test]
fn unprintable_values_still_produce_valid_lines() {
    struct Exploding;
    impl std::fmt::Display for Exploding {
        fn fmt(&self, _f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            panic!("refuse to render")
        }
    }

    let (logger, sink) = memory_logger();
    logger.info(LogMessage::display(Exploding));

    let record = single_record(&sink);
    assert_eq!(record.get("message"), Some(&json!("<unprintable>")));
}

#[test]
fn deeply_nested_structures_terminate() {
    let mut value = json!({ "leaf": true });
    for _ in 0..200 {
        value = json!({ "next": value });
    }

    let (logger, sink) = memory_logger();
    logger.info(value);

    // Depth limiting terminated the recursion and produced one valid line.
    let record = single_record(&sink);
    let mut cursor = &record;
    let mut depth = 0;
    while let Some(next) = cursor.get("next") {
        cursor = next;
        depth += 1;
        assert!(depth <= 12, "recursion did not terminate");
    }
    assert_eq!(cursor.get("error"), Some(&json!("max_depth_exceeded")));
}

#[test]
fn system_fields_override_message_fields() {
    let (logger, sink) = memory_logger();
    logger.info(json!({ "severity": "CUSTOM", "event": "test" }));

    let record = single_record(&sink);
    assert_eq!(record.get("severity"), Some(&json!("INFO")));
    assert_eq!(record.get("event"), Some(&json!("test")));
}

#[test]
fn ambient_context_cannot_shadow_system_fields() {
    let (logger, sink) = memory_logger();
    with_context(
        json!({
            "severity": "HACK",
            "timestamp": "spoofed",
            "message": "spoofed",
            "tags": ["spoofed"],
            "context": { "inner": true },
            "real": 1,
        }),
        || logger.info("hello"),
    );

    let record = single_record(&sink);
    assert_eq!(record.get("severity"), Some(&json!("INFO")));
    assert_eq!(record.get("message"), Some(&json!("hello")));
    assert!(record.get("tags").is_none());
    let context = record.get("context").expect("context");
    assert_eq!(context, &json!({ "real": 1 }));
}

#[test]
fn sensitive_fields_are_filtered_end_to_end() {
    let (logger, sink) = memory_logger();
    logger.info(json!({ "password": "hunter2", "user": "alice" }));

    let line = &sink.lines()[0];
    assert!(!line.contains("hunter2"));
    let record: Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(record.get("password_filtered"), Some(&json!("[FILTERED]")));
    assert_eq!(record.get("user"), Some(&json!("alice")));
}

#[test]
fn json_strings_are_expanded_and_malformed_ones_kept() {
    let (logger, sink) = memory_logger();
    logger.info(r#"{"a":1}"#);
    logger.info(r#"{"a":"#);

    let lines = sink.lines();
    let expanded: Value = serde_json::from_str(lines[0].trim_end()).unwrap();
    assert_eq!(expanded.get("a"), Some(&json!(1)));
    assert!(expanded.get("message").is_none());

    let kept: Value = serde_json::from_str(lines[1].trim_end()).unwrap();
    assert_eq!(kept.get("message"), Some(&json!(r#"{"a":"#)));
}

#[test]
fn concurrent_threads_see_only_their_own_tags_and_context() {
    let sink = Arc::new(MemorySink::new());
    let logger = Logger::new(sink.clone() as Arc<dyn Sink>);

    let spawn = |tag: &'static str, user: i64| {
        let logger = logger.clone();
        std::thread::spawn(move || {
            for _ in 0..50 {
                logger.tagged_scope([tag], || {
                    with_context(json!({ "user_id": user }), || {
                        logger.info("tick");
                    });
                });
            }
        })
    };

    let a = spawn("A", 1);
    let b = spawn("B", 2);
    a.join().expect("thread A");
    b.join().expect("thread B");

    let lines = sink.lines();
    assert_eq!(lines.len(), 100);
    for line in &lines {
        let record: Value = serde_json::from_str(line.trim_end()).unwrap();
        let tag = record.pointer("/tags/0").and_then(Value::as_str).unwrap();
        let user = record.pointer("/context/user_id").and_then(Value::as_i64).unwrap();
        match tag {
            "A" => assert_eq!(user, 1, "thread A contaminated: {line}"),
            "B" => assert_eq!(user, 2, "thread B contaminated: {line}"),
            other => panic!("unexpected tag {other}"),
        }
        assert_eq!(record.pointer("/tags/1"), None, "exactly one tag per line");
    }
}

#[test]
fn every_hostile_input_still_yields_parseable_output() {
    let (logger, sink) = memory_logger();

    logger.info("\x00\x01\x02");
    logger.info("x".repeat(50_000));
    logger.info(json!({ "deep": { "tags": "not-an-array" } }));
    logger.info(Value::Null);
    logger.unknown(json!([1, 2, 3]));

    for line in sink.lines() {
        let record: Value = serde_json::from_str(line.trim_end()).expect("valid json");
        assert!(record.get("severity").is_some());
        assert!(record.get("timestamp").is_some());
    }
}
