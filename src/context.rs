use serde_json::{Map, Value};
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

thread_local! {
    // Ambient key-value context for the current execution context.
    // Mutated only through `ContextScope`, so every mutation is paired
    // with a restore.
    static CONTEXT: RefCell<Map<String, Value>> = RefCell::new(Map::new());
}

type TransformFn = dyn Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync;

// Process-wide transform hook, applied to a copy of the context at read
// time. Readers clone the Arc under the read lock, so replacing the hook
// is atomic with respect to concurrent readers.
static TRANSFORM: RwLock<Option<Arc<TransformFn>>> = RwLock::new(None);

/// Register the process-wide context transform hook.
///
/// The hook receives a duplicate of the ambient context on every read
/// and returns the mapping to use instead. A hook that panics is
/// ignored for that read and the untransformed context is used — a
/// broken transform must never break logging.
pub fn set_context_transform<F>(hook: F)
where
    F: Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
{
    let mut slot = match TRANSFORM.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *slot = Some(Arc::new(hook));
}

/// Remove the transform hook, reverting reads to the raw context.
pub fn clear_context_transform() {
    let mut slot = match TRANSFORM.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *slot = None;
}

fn transform_hook() -> Option<Arc<TransformFn>> {
    let slot = match TRANSFORM.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    slot.clone()
}

/// RAII scope that merges `extra` into the ambient context and restores
/// the exact prior snapshot on drop, panics included.
///
/// Nested scopes merge shallowly: inner keys override outer keys with
/// the same name, everything else from both levels stays visible.
#[must_use = "dropping the scope immediately restores the previous context"]
pub struct ContextScope {
    saved: Map<String, Value>,
}

impl ContextScope {
    /// Enter a context scope. Non-mapping `extra` values are coerced to
    /// an empty mapping, so the scope still nests and restores cleanly.
    pub fn enter(extra: Value) -> Self {
        let extra = match extra {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let saved = CONTEXT.with(|ctx| {
            let mut current = ctx.borrow_mut();
            let saved = current.clone();
            for (key, value) in extra {
                current.insert(key, value);
            }
            saved
        });
        ContextScope { saved }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let saved = std::mem::take(&mut self.saved);
        CONTEXT.with(|ctx| *ctx.borrow_mut() = saved);
    }
}

/// Run `f` with `extra` merged into the ambient context.
pub fn with_context<R>(extra: Value, f: impl FnOnce() -> R) -> R {
    let _scope = ContextScope::enter(extra);
    f()
}

/// Duplicate of the current ambient context, with the transform hook
/// (if any) applied to the copy. A panicking hook yields the
/// untransformed duplicate instead.
pub fn current_context() -> Map<String, Value> {
    let base = CONTEXT.with(|ctx| ctx.borrow().clone());
    match transform_hook() {
        Some(hook) => {
            let transformed = catch_unwind(AssertUnwindSafe(|| hook(base.clone())));
            transformed.unwrap_or(base)
        }
        None => base,
    }
}

/// Swap in a replacement context and return the previous one. Used by
/// the scope future to carry context across polls.
pub(crate) fn replace_context(next: Map<String, Value>) -> Map<String, Value> {
    CONTEXT.with(|ctx| std::mem::replace(&mut *ctx.borrow_mut(), next))
}

/// Raw snapshot of the ambient context, without the transform hook.
pub(crate) fn raw_context() -> Map<String, Value> {
    CONTEXT.with(|ctx| ctx.borrow().clone())
}
