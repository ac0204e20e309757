use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::clock;
use crate::entry::Entry;
use crate::error::{Cancelled, Cause, ConfigError, PoolError};
use crate::reaper::{self, ReaperShutdown};
use crate::selector::{DefaultScheduler, Scheduler};
use crate::slot::{Slot, WaitOutcome};
use crate::stripe::StripeState;

pub(crate) type CreateFn<R> = Box<dyn Fn() -> Result<R, Cause> + Send + Sync>;
pub(crate) type DestroyFn<R> = Box<dyn Fn(R) -> Result<(), Cause> + Send + Sync>;

/// How a [`Resource`] was obtained (§6's introspection interface).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Built by `create_fn` because neither the cache nor a waiter
    /// handoff could satisfy the request.
    Created,
    /// Popped from the stripe's idle cache.
    Taken,
    /// Blocked on a `Slot` until a concurrent `put` handed one over.
    WaitedFor,
}

/// A borrowed resource plus the telemetry the design calls its
/// "introspection interface" (§6): how it was obtained, how long
/// acquisition took, and the stripe's remaining capacity right after.
#[derive(Debug)]
pub struct Resource<R> {
    /// The borrowed value. Pass it to [`Pool::put`] or [`Pool::destroy`]
    /// (via the [`LocalPool`] handle returned alongside it) when done.
    pub value: R,
    /// Wall-clock time spent inside [`Pool::take`], in seconds.
    pub acquisition_latency_s: f64,
    /// How the value was obtained.
    pub method: Method,
    /// The stripe's `available` counter immediately after this borrow.
    pub available_after: usize,
}

/// A handle to the stripe a [`Resource`] was borrowed from (the design's
/// "LocalPool", §3, C3). Opaque, `Copy`, and only meaningful together
/// with the [`Pool`] that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPool(pub(crate) usize);

/// A cooperative cancellation flag for [`Pool::take_cancellable`].
///
/// Rust's blocking threads have no first-class asynchronous interrupt
/// (unlike the GHC runtime this design is modeled on), so cancellation
/// here is cooperative: the waiting thread polls this flag at a bounded
/// interval rather than being interrupted instantly. See `DESIGN.md` for
/// the tradeoff.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that starts out not cancelled.
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation of whichever `take_cancellable` call is
    /// holding (a clone of) this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The error type for [`Pool::take_cancellable`]: either the usual
/// create failure, or a cancellation. Kept distinct from [`PoolError`]
/// because the design's error policy (§7) treats cancellation as *not*
/// an error of the pool.
#[derive(Debug)]
pub enum AcquireError {
    /// `create_fn` failed; see [`PoolError`].
    Create(PoolError),
    /// The wait was cancelled.
    Cancelled(Cancelled),
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireError::Create(e) => fmt::Display::fmt(e, f),
            AcquireError::Cancelled(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for AcquireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AcquireError::Create(e) => Some(e),
            AcquireError::Cancelled(e) => Some(e),
        }
    }
}

/// Owns the stripe array, the factory callbacks, and the reaper
/// lifecycle (§3, C7). Never constructed directly; see [`new_pool`].
pub(crate) struct PoolInner<R> {
    stripes: Vec<Mutex<StripeState<R>>>,
    create: CreateFn<R>,
    destroy: DestroyFn<R>,
    idle_timeout: f64,
    scheduler: Box<dyn Scheduler + Send + Sync>,
    reaper_shutdown: Arc<ReaperShutdown>,
    reaper_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<R> PoolInner<R> {
    /// Run one reaper sweep (§4.6): called from the background thread in
    /// `reaper.rs`, never from a client-facing call.
    pub(crate) fn reap_once(&self) {
        let now = clock::now();
        for (idx, stripe) in self.stripes.iter().enumerate() {
            let stale = {
                let mut guard = stripe.lock().unwrap();
                guard.evict_stale(now, self.idle_timeout)
            };
            if !stale.is_empty() {
                tracing::debug!(stripe = idx, evicted = stale.len(), "reaper evicted idle entries");
            }
            for entry in stale {
                if let Err(e) = (self.destroy)(entry.value) {
                    tracing::warn!(stripe = idx, error = %e, "destroy_fn failed during reap; swallowing");
                }
            }
        }
    }
}

impl<R> Drop for PoolInner<R> {
    fn drop(&mut self) {
        self.reaper_shutdown.signal();
        if let Some(handle) = self.reaper_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        for (idx, stripe) in self.stripes.iter().enumerate() {
            let stale = stripe.lock().unwrap().drain_cache();
            for entry in stale {
                if let Err(e) = (self.destroy)(entry.value) {
                    tracing::warn!(stripe = idx, error = %e, "destroy_fn failed while dropping pool; swallowing");
                }
            }
        }
    }
}

/// A striped resource pool (§1–§3). Cheap to clone; clones share the
/// same stripes, factory callbacks, and reaper.
pub struct Pool<R> {
    inner: Arc<PoolInner<R>>,
}

impl<R> Clone for Pool<R> {
    fn clone(&self) -> Self {
        Pool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> fmt::Debug for Pool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("stripes", &self.inner.stripes.len())
            .finish()
    }
}

/// Constructs a [`Pool`] (§4.2). `idle_timeout_s` must be `>= 0.5` and
/// `max_resources` must be `>= 1`; violations are reported as a
/// [`ConfigError`]. Stripe count is fixed at construction to the host's
/// reported parallelism; per-stripe capacity is
/// `ceil(max_resources / stripe_count)`, so the effective total may
/// exceed `max_resources` by up to `stripe_count - 1`.
pub fn new_pool<R, C, CE, D, DE>(
    create: C,
    destroy: D,
    idle_timeout_s: f64,
    max_resources: usize,
) -> Result<Pool<R>, ConfigError>
where
    R: Send + 'static,
    C: Fn() -> Result<R, CE> + Send + Sync + 'static,
    CE: std::error::Error + Send + Sync + 'static,
    D: Fn(R) -> Result<(), DE> + Send + Sync + 'static,
    DE: std::error::Error + Send + Sync + 'static,
{
    Pool::with_scheduler(create, destroy, idle_timeout_s, max_resources, DefaultScheduler::new())
}

impl<R> Pool<R>
where
    R: Send + 'static,
{
    /// Like [`new_pool`], but with an explicit [`Scheduler`] instead of
    /// the host-default one. Mainly useful for tests that need to pin
    /// down the stripe count and current-context mapping.
    pub fn with_scheduler<C, CE, D, DE, S>(
        create: C,
        destroy: D,
        idle_timeout_s: f64,
        max_resources: usize,
        scheduler: S,
    ) -> Result<Pool<R>, ConfigError>
    where
        C: Fn() -> Result<R, CE> + Send + Sync + 'static,
        CE: std::error::Error + Send + Sync + 'static,
        D: Fn(R) -> Result<(), DE> + Send + Sync + 'static,
        DE: std::error::Error + Send + Sync + 'static,
        S: Scheduler + 'static,
    {
        if idle_timeout_s < 0.5 {
            return Err(ConfigError::IdleTimeoutTooShort {
                requested: idle_timeout_s,
            });
        }
        if max_resources < 1 {
            return Err(ConfigError::MaxResourcesZero);
        }

        let stripe_count = scheduler.num_contexts().max(1);
        let per_stripe_capacity = (max_resources + stripe_count - 1) / stripe_count;
        let stripes = (0..stripe_count)
            .map(|_| Mutex::new(StripeState::new(per_stripe_capacity)))
            .collect();

        let reaper_shutdown = ReaperShutdown::new();
        let inner = Arc::new(PoolInner {
            stripes,
            create: Box::new(move || create().map_err(|e| Box::new(e) as Cause)),
            destroy: Box::new(move |v| destroy(v).map_err(|e| Box::new(e) as Cause)),
            idle_timeout: idle_timeout_s,
            scheduler: Box::new(scheduler),
            reaper_shutdown: Arc::clone(&reaper_shutdown),
            reaper_handle: Mutex::new(None),
        });

        let handle = reaper::spawn(Arc::downgrade(&inner), reaper_shutdown);
        *inner.reaper_handle.lock().unwrap() = Some(handle);

        tracing::debug!(
            stripe_count,
            per_stripe_capacity,
            idle_timeout_s,
            "pool constructed"
        );
        Ok(Pool { inner })
    }

    /// Borrows a resource (§4.3), blocking indefinitely if the owning
    /// stripe is exhausted.
    pub fn take(&self) -> Result<(Resource<R>, LocalPool), PoolError> {
        match self.take_inner(None) {
            Ok(pair) => Ok(pair),
            Err(AcquireError::Create(e)) => Err(e),
            Err(AcquireError::Cancelled(_)) => {
                unreachable!("take() never supplies a cancel token")
            }
        }
    }

    /// Like [`Pool::take`], but the wait can be cancelled from another
    /// thread by calling [`CancelToken::cancel`] on a clone of `cancel`.
    /// See `DESIGN.md` for the cancellation protocol (§4.3 "Waiter
    /// cancellation").
    pub fn take_cancellable(&self, cancel: &CancelToken) -> Result<(Resource<R>, LocalPool), AcquireError> {
        self.take_inner(Some(cancel))
    }

    fn take_inner(&self, cancel: Option<&CancelToken>) -> Result<(Resource<R>, LocalPool), AcquireError> {
        let t1 = clock::now();
        let idx = self.inner.scheduler.current_context() % self.inner.stripes.len();
        let stripe = &self.inner.stripes[idx];

        let mut guard = stripe.lock().unwrap();
        if !guard.has_capacity() {
            let slot = Arc::new(Slot::new());
            guard.enqueue_waiter(Arc::clone(&slot));
            drop(guard);
            tracing::trace!(stripe = idx, "take: stripe exhausted, waiting for handoff");

            static NEVER_CANCELLED: AtomicBool = AtomicBool::new(false);
            let flag: &AtomicBool = cancel.map(|c| c.0.as_ref()).unwrap_or(&NEVER_CANCELLED);

            match slot.wait(flag) {
                WaitOutcome::Resource(value) => {
                    let latency = clock::now() - t1;
                    Ok((
                        Resource {
                            value,
                            acquisition_latency_s: latency,
                            method: Method::WaitedFor,
                            available_after: 0,
                        },
                        LocalPool(idx),
                    ))
                }
                WaitOutcome::Cancelled => Err(AcquireError::Cancelled(Cancelled)),
                WaitOutcome::CancelledWithResource(value) => {
                    tracing::trace!(
                        stripe = idx,
                        "cancelled waiter re-publishing resource handed off mid-cancel"
                    );
                    self.put(LocalPool(idx), value);
                    Err(AcquireError::Cancelled(Cancelled))
                }
                WaitOutcome::Retry => {
                    tracing::trace!(stripe = idx, "take: granted freed capacity, creating directly");
                    match (self.inner.create)() {
                        Ok(value) => Ok((
                            Resource {
                                value,
                                acquisition_latency_s: clock::now() - t1,
                                method: Method::Created,
                                available_after: 0,
                            },
                            LocalPool(idx),
                        )),
                        Err(e) => {
                            self.release_capacity(idx);
                            Err(AcquireError::Create(PoolError::create_failed(e)))
                        }
                    }
                }
                WaitOutcome::CancelledAfterRetry => {
                    tracing::trace!(
                        stripe = idx,
                        "cancelled waiter declining capacity granted mid-cancel"
                    );
                    self.release_capacity(idx);
                    Err(AcquireError::Cancelled(Cancelled))
                }
            }
        } else if let Some(entry) = guard.pop_cache() {
            let available_after = guard.available();
            drop(guard);
            Ok((
                Resource {
                    value: entry.value,
                    acquisition_latency_s: clock::now() - t1,
                    method: Method::Taken,
                    available_after,
                },
                LocalPool(idx),
            ))
        } else {
            guard.reserve_for_create();
            let available_after = guard.available();
            drop(guard);
            match (self.inner.create)() {
                Ok(value) => Ok((
                    Resource {
                        value,
                        acquisition_latency_s: clock::now() - t1,
                        method: Method::Created,
                        available_after,
                    },
                    LocalPool(idx),
                )),
                Err(e) => {
                    self.release_capacity(idx);
                    Err(AcquireError::Create(PoolError::create_failed(e)))
                }
            }
        }
    }

    /// Frees one unit of a stripe's capacity (§4.5): if a waiter is
    /// already queued, the capacity is handed straight to it (via
    /// [`Slot::signal_retry`]) so it can run its own `create` instead of
    /// the capacity sitting idle for a new caller to race for — the same
    /// FIFO-fairness guarantee [`Pool::put`] gives a returned value.
    /// Only once no (live) waiter remains does the capacity actually get
    /// counted back into `available`.
    fn release_capacity(&self, idx: usize) {
        let stripe = &self.inner.stripes[idx];
        let mut guard = stripe.lock().unwrap();

        while let Some(waiter) = guard.dequeue_waiter() {
            if waiter.signal_retry() {
                tracing::trace!(stripe = idx, "capacity released: signaled a waiter to retry creation");
                return;
            }
            tracing::trace!(stripe = idx, "capacity released: skipping tombstoned waiter");
        }

        guard.restore();
        tracing::trace!(stripe = idx, "capacity released: no waiters, available restored");
    }

    /// Returns a resource to the stripe it came from (§4.4): hands it
    /// straight to the oldest live waiter if one exists, otherwise caches
    /// it at the LIFO head.
    pub fn put(&self, handle: LocalPool, value: R) {
        let idx = handle.0;
        let stripe = &self.inner.stripes[idx];
        let mut guard = stripe.lock().unwrap();

        let mut value = value;
        while let Some(waiter) = guard.dequeue_waiter() {
            match waiter.fill(value) {
                Ok(()) => {
                    tracing::trace!(stripe = idx, "put: handed resource directly to a waiter");
                    return;
                }
                Err(returned) => {
                    tracing::trace!(stripe = idx, "put: skipping tombstoned waiter");
                    value = returned;
                }
            }
        }

        let now = clock::now();
        guard.push_cache(Entry::new(value, now));
        tracing::trace!(stripe = idx, "put: cached idle resource");
    }

    /// Marks a borrowed resource as unusable (§4.5): releases the
    /// stripe's capacity before running `destroy_fn`, so a concurrent
    /// acquirer — including one already queued as a waiter — can start
    /// building a replacement without waiting on a potentially slow
    /// destructor.
    pub fn destroy(&self, handle: LocalPool, value: R) {
        let idx = handle.0;
        self.release_capacity(idx);
        if let Err(e) = (self.inner.destroy)(value) {
            tracing::warn!(stripe = idx, error = %e, "destroy_fn failed; swallowing");
        }
    }

    /// Drops every cached (idle) resource across all stripes (§4.5).
    /// Leaves `available` untouched since it only tracks borrowed
    /// resources. Intended for recovering from a wholesale backend
    /// failure.
    pub fn destroy_all(&self) {
        for (idx, stripe) in self.inner.stripes.iter().enumerate() {
            let stale = {
                let mut guard = stripe.lock().unwrap();
                guard.drain_cache()
            };
            for entry in stale {
                if let Err(e) = (self.inner.destroy)(entry.value) {
                    tracing::warn!(stripe = idx, error = %e, "destroy_fn failed during destroy_all; swallowing");
                }
            }
        }
    }

    /// Scoped borrow (§4.7): runs `f` with the borrowed resource,
    /// returning it on success and destroying it (rather than returning
    /// it) if `f` fails, since a failing callback is evidence the
    /// resource may be corrupted.
    pub fn with_resource<T, E, F>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(&mut R) -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let (mut resource, handle) = self.take()?;
        match f(&mut resource.value) {
            Ok(t) => {
                self.put(handle, resource.value);
                Ok(t)
            }
            Err(e) => {
                self.destroy(handle, resource.value);
                Err(PoolError::callback_failed(e))
            }
        }
    }

    /// Explicitly tears the pool down: cancels the reaper and drains
    /// every stripe's cache. Equivalent to dropping the last clone of
    /// this handle, spelled out for callers who want the timely release
    /// the design recommends (§4.2) instead of relying on eventual
    /// `Drop`.
    pub fn shutdown(self) {
        drop(self);
    }
}
