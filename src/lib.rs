pub mod severity;
pub mod message;
pub mod filter;
pub mod sanitize;
pub mod parse;
pub mod tags;
pub mod context;
pub mod payload;
pub mod encode;
pub mod sink;
pub mod logger;
pub mod scope;
pub mod env;

pub use context::{clear_context_transform, set_context_transform, with_context, ContextScope};
pub use filter::FieldFilter;
pub use logger::{Builder, Logger};
pub use message::LogMessage;
pub use scope::FutureExt;
pub use severity::Severity;
pub use sink::{make_sink, MemorySink, NoopSink, Sink, StderrSink, StdoutSink, WriterSink};
pub use tags::TagScope;
