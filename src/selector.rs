use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::thread;

/// The out-of-scope "scheduler introspection" collaborator from the design
/// (§1): the pool needs to know how many independent execution contexts
/// exist and which one the caller is currently running on, but it does
/// not implement that introspection itself. [`DefaultScheduler`] is the
/// stock implementation; supply your own [`Scheduler`] if your host has a
/// real notion of CPU affinity or worker-thread identity.
pub trait Scheduler: Send + Sync {
    /// Number of independent execution contexts, fixed for the pool's
    /// lifetime — the stripe count is derived from this once, at
    /// construction, and never adapts afterwards.
    fn num_contexts(&self) -> usize;

    /// A stable identifier for whatever is calling right now. Placement
    /// only needs to be stable across a single take/put pair, not
    /// globally stable.
    fn current_context(&self) -> usize;
}

/// Uses `std::thread::available_parallelism` for the context count and a
/// hash of the calling thread's `ThreadId` to pick a context, per the
/// design's own fallback ("a round-robin or hash of a thread identifier
/// is acceptable provided placement is stable across the borrow/return
/// pair").
#[derive(Debug, Default)]
pub struct DefaultScheduler {
    contexts: Option<NonZeroUsize>,
}

impl DefaultScheduler {
    pub fn new() -> Self {
        DefaultScheduler { contexts: None }
    }
}

impl Scheduler for DefaultScheduler {
    fn num_contexts(&self) -> usize {
        self.contexts
            .or_else(|| thread::available_parallelism().ok())
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    fn current_context(&self) -> usize {
        let mut hasher = DefaultHasher::new();
        thread::current().id().hash(&mut hasher);
        hasher.finish() as usize
    }
}
