use json_line_logger::{with_context, Logger, Severity};
use serde_json::json;
use std::sync::Arc;

fn main() {
    let sink = json_line_logger::make_sink("stdout").expect("resolve sink");
    let logger = Logger::builder()
        .sink(Arc::clone(&sink))
        .min_severity(Severity::Debug)
        .tags(["payments"])
        .build();

    logger.info("service starting");

    // Per-request scope: tags and context apply to every call inside and
    // are fully restored afterwards.
    logger.tagged_scope(["REQUEST", "req-8412"], || {
        with_context(json!({ "user_id": 42, "region": "eu-west-1" }), || {
            logger.info(json!({ "event": "charge_created", "amount_cents": 1299 }));
            logger.warn(json!({ "event": "slow_query", "elapsed_ms": 741 }));
        });
    });

    // Derived logger: tags baked in for its lifetime, sink shared.
    let worker = logger.tagged(["worker"]);
    worker.debug("draining queue");

    logger.info("service stopped");
}
