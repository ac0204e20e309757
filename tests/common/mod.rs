use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use striped_pool::Scheduler;

/// A trivial resource: a monotonically increasing id, so tests can tell
/// distinct instances apart and assert LIFO/FIFO ordering by identity.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Widget(pub u64);

#[derive(Debug)]
pub struct CreateErr(pub &'static str);

impl fmt::Display for CreateErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "create failed: {}", self.0)
    }
}
impl std::error::Error for CreateErr {}

#[derive(Debug)]
pub struct DestroyErr(pub &'static str);

impl fmt::Display for DestroyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "destroy failed: {}", self.0)
    }
}
impl std::error::Error for DestroyErr {}

/// Returns a `create_fn` that hands out `Widget(0), Widget(1), ...` and a
/// shared counter of how many destroys have been observed, along with the
/// ids that were destroyed (for round-trip / P3 checks).
pub fn counting_factory() -> (
    impl Fn() -> Result<Widget, CreateErr> + Send + Sync + Clone,
    impl Fn(Widget) -> Result<(), DestroyErr> + Send + Sync + Clone,
    Arc<AtomicU64>,
    Arc<std::sync::Mutex<Vec<u64>>>,
) {
    let next_id = Arc::new(AtomicU64::new(0));
    let destroyed = Arc::new(std::sync::Mutex::new(Vec::new()));

    let create = {
        let next_id = Arc::clone(&next_id);
        move || Ok(Widget(next_id.fetch_add(1, Ordering::SeqCst)))
    };
    let destroy = {
        let destroyed = Arc::clone(&destroyed);
        move |w: Widget| {
            destroyed.lock().unwrap().push(w.0);
            Ok(())
        }
    };

    (create, destroy, next_id, destroyed)
}

/// A `Scheduler` with a fixed context count whose "current context" is
/// controlled per-thread via `set_context`, so multi-stripe tests don't
/// depend on guessing how the OS schedules test threads.
#[derive(Debug, Default)]
pub struct FixedScheduler {
    pub contexts: usize,
}

thread_local! {
    static CURRENT_CONTEXT: Cell<usize> = const { Cell::new(0) };
}

/// Binds the calling thread to `ctx` for any `FixedScheduler` it uses
/// afterwards.
pub fn set_context(ctx: usize) {
    CURRENT_CONTEXT.with(|c| c.set(ctx));
}

impl Scheduler for FixedScheduler {
    fn num_contexts(&self) -> usize {
        self.contexts.max(1)
    }

    fn current_context(&self) -> usize {
        CURRENT_CONTEXT.with(|c| c.get())
    }
}
