use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    // Ambient tag stacks, keyed by logger stack id so that loggers (and
    // loggers derived via `tagged`) never share a stack. Thread-locality
    // gives per-execution-context isolation; `crate::scope` extends the
    // same storage across task suspension points.
    static AMBIENT_TAGS: RefCell<HashMap<u64, Vec<String>>> = RefCell::new(HashMap::new());
}

/// Append tags to the ambient stack for `stack_id`, returning how many
/// entries were actually pushed. Empty tags are skipped.
pub(crate) fn push_tags(stack_id: u64, tags: &[String]) -> usize {
    AMBIENT_TAGS.with(|stacks| {
        let mut stacks = stacks.borrow_mut();
        let stack = stacks.entry(stack_id).or_default();
        let before = stack.len();
        stack.extend(tags.iter().filter(|t| !t.is_empty()).cloned());
        stack.len() - before
    })
}

/// Remove up to `n` entries from the end of the stack and return them.
///
/// Clamped to the current length: if the stack shrank since the matching
/// push (external mutation, misnested calls), pop removes what is there
/// and never underflows.
pub(crate) fn pop_tags(stack_id: u64, n: usize) -> Vec<String> {
    AMBIENT_TAGS.with(|stacks| {
        let mut stacks = stacks.borrow_mut();
        let Some(stack) = stacks.get_mut(&stack_id) else {
            return Vec::new();
        };
        let cut = stack.len().saturating_sub(n);
        let removed = stack.split_off(cut);
        if stack.is_empty() {
            stacks.remove(&stack_id);
        }
        removed
    })
}

/// Snapshot of the ambient tags for `stack_id`, outermost first.
pub(crate) fn ambient_tags(stack_id: u64) -> Vec<String> {
    AMBIENT_TAGS.with(|stacks| {
        stacks
            .borrow()
            .get(&stack_id)
            .cloned()
            .unwrap_or_default()
    })
}

/// Swap in a full replacement stack and return the previous one. Used by
/// the scope future to carry tag state across polls.
pub(crate) fn replace_ambient_tags(stack_id: u64, tags: Vec<String>) -> Vec<String> {
    AMBIENT_TAGS.with(|stacks| {
        let mut stacks = stacks.borrow_mut();
        if tags.is_empty() {
            stacks.remove(&stack_id).unwrap_or_default()
        } else {
            stacks.insert(stack_id, tags).unwrap_or_default()
        }
    })
}

/// RAII guard for a `tagged` scope: pushes on construction, pops exactly
/// what it pushed on drop — on every exit path, panics included.
#[must_use = "dropping the scope immediately pops the tags"]
pub struct TagScope {
    stack_id: u64,
    pushed: usize,
}

impl TagScope {
    pub(crate) fn enter(stack_id: u64, tags: &[String]) -> Self {
        let pushed = push_tags(stack_id, tags);
        TagScope { stack_id, pushed }
    }
}

impl Drop for TagScope {
    fn drop(&mut self) {
        pop_tags(self.stack_id, self.pushed);
    }
}
