use crate::context;
use crate::logger::Logger;
use crate::tags;
use pin_project_lite::pin_project;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// Future adapter that carries a logger's ambient tags and the
    /// ambient context across suspension points.
    ///
    /// The thread-local storage backing tags and context isolates OS
    /// threads by itself; cooperative schedulers multiplex many tasks
    /// onto few threads, so this wrapper swaps the captured state in
    /// before every poll and parks it back in the future afterwards.
    /// Two tasks wrapped this way never observe each other's tags or
    /// context, even when polled interleaved on the same thread —
    /// `TagScope` / `ContextScope` guards held across `.await` keep
    /// working.
    pub struct LogScoped<F> {
        #[pin]
        inner: F,
        stack_id: u64,
        tags: Vec<String>,
        context: Map<String, Value>,
    }
}

struct Entered<'a> {
    stack_id: u64,
    tags: &'a mut Vec<String>,
    context: &'a mut Map<String, Value>,
    prev_tags: Vec<String>,
    prev_context: Map<String, Value>,
}

impl<'a> Entered<'a> {
    fn enter(
        stack_id: u64,
        tags: &'a mut Vec<String>,
        context: &'a mut Map<String, Value>,
    ) -> Self {
        let prev_tags = tags::replace_ambient_tags(stack_id, std::mem::take(tags));
        let prev_context = context::replace_context(std::mem::take(context));
        Entered {
            stack_id,
            tags,
            context,
            prev_tags,
            prev_context,
        }
    }
}

impl Drop for Entered<'_> {
    // Park the (possibly mutated) task state back in the future and
    // restore the thread's previous state. Runs on every exit path of
    // the poll, panics included.
    fn drop(&mut self) {
        *self.tags =
            tags::replace_ambient_tags(self.stack_id, std::mem::take(&mut self.prev_tags));
        *self.context = context::replace_context(std::mem::take(&mut self.prev_context));
    }
}

impl<F: Future> Future for LogScoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.project();
        let _entered = Entered::enter(*this.stack_id, this.tags, this.context);
        this.inner.poll(cx)
    }
}

/// Extension adding log-scope propagation to any future.
pub trait FutureExt: Future + Sized {
    /// Wrap this future so that `logger`'s current ambient tags and the
    /// current ambient context travel with it across `.await` points.
    ///
    /// The state active when this is called becomes the future's
    /// starting state; scopes entered inside the future stay inside it.
    fn in_log_scope(self, logger: &Logger) -> LogScoped<Self> {
        LogScoped {
            inner: self,
            stack_id: logger.stack_id(),
            tags: tags::ambient_tags(logger.stack_id()),
            context: context::raw_context(),
        }
    }
}

impl<F: Future> FutureExt for F {}
