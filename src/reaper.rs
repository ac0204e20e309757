use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::pool::PoolInner;

/// Fixed tick cadence (§4.6): "once per second (approximately; drift is
/// tolerated)". Bounds eviction lag to `idle_timeout + 1s`.
const TICK: Duration = Duration::from_secs(1);

/// Shared shutdown signal: a bool flipped under a `Mutex`, woken via
/// `Condvar` so the reaper thread wakes immediately on shutdown instead
/// of waiting out its current tick — cancellation is "observed between
/// ticks" (§4.6).
pub(crate) struct ReaperShutdown {
    state: Mutex<bool>,
    cv: Condvar,
}

impl ReaperShutdown {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(ReaperShutdown {
            state: Mutex::new(false),
            cv: Condvar::new(),
        })
    }

    pub(crate) fn signal(&self) {
        *self.state.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

/// Spawns the background eviction task (§4.6, C6). Holds only a `Weak`
/// reference to the pool so a dropped `Pool` doesn't keep the reaper
/// thread (and thus the whole stripe array) alive forever, mirroring the
/// teacher's `IdleTask` holding a `WeakOpt<Mutex<PoolInner<T, K>>>`.
pub(crate) fn spawn<R>(pool: Weak<PoolInner<R>>, shutdown: Arc<ReaperShutdown>) -> JoinHandle<()>
where
    R: Send + 'static,
{
    thread::Builder::new()
        .name("striped-pool-reaper".into())
        .spawn(move || loop {
            let guard = shutdown.state.lock().unwrap();
            let (guard, _timeout) = shutdown.cv.wait_timeout(guard, TICK).unwrap();
            let should_stop = *guard;
            drop(guard);
            if should_stop {
                tracing::trace!("reaper observed shutdown between ticks");
                return;
            }
            match pool.upgrade() {
                Some(inner) => inner.reap_once(),
                None => return,
            }
        })
        .expect("failed to spawn reaper thread")
}
