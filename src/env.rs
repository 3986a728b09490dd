use crate::logger::Logger;
use crate::severity::Severity;
use crate::sink::make_sink;

/// Environment variable names used by this crate for convenient
/// configuration of loggers from services.
///
/// These are purely helpers; the core logger types remain decoupled
/// from environment access.

/// Minimum severity name, e.g. `INFO` or `warn`. Defaults to `DEBUG`.
pub const LOG_LEVEL_ENV: &str = "JSON_LOGGER_LEVEL";

/// Sink target string accepted by [`make_sink`], e.g. `stderr`,
/// `stdout`, `null`, or `file:///var/log/app.jsonl`.
pub const LOG_SINK_ENV: &str = "JSON_LOGGER_SINK";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Severity threshold from [`LOG_LEVEL_ENV`]; unparsable or missing
/// values fall back to DEBUG rather than erroring.
pub fn severity_from_env() -> Severity {
    env_or(LOG_LEVEL_ENV, "DEBUG").parse().unwrap_or(Severity::Debug)
}

/// Build a logger from the environment: sink target from
/// [`LOG_SINK_ENV`] (stderr when unset or unresolvable), threshold from
/// [`LOG_LEVEL_ENV`]. Misconfiguration degrades to defaults — wiring
/// the logger can't fail at startup.
pub fn logger_from_env() -> Logger {
    let mut builder = Logger::builder().min_severity(severity_from_env());
    if let Ok(sink) = make_sink(&env_or(LOG_SINK_ENV, "stderr")) {
        builder = builder.sink(sink);
    }
    builder.build()
}
