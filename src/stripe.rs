use std::sync::Arc;

use crate::entry::Entry;
use crate::queue::WaiterQueue;
use crate::slot::Slot;

/// Per-stripe mutable state (§3 of the design notes): a counting of
/// unborrowed capacity, a LIFO idle cache, and a FIFO of waiters.
///
/// Held behind a `Mutex` by the pool (one per stripe); every method here
/// assumes the caller already holds that lock.
pub(crate) struct StripeState<R> {
    /// Unborrowed capacity: `capacity - (resources currently outside the
    /// pool, including in-flight creations)`.
    available: usize,
    capacity: usize,
    cache: Vec<Entry<R>>,
    waiters: WaiterQueue<Arc<Slot<R>>>,
}

impl<R> StripeState<R> {
    pub(crate) fn new(capacity: usize) -> Self {
        StripeState {
            available: capacity,
            capacity,
            cache: Vec::new(),
            waiters: WaiterQueue::new(),
        }
    }

    pub(crate) fn available(&self) -> usize {
        self.available
    }

    /// Step 3/4/5 of acquire: is there slack to hand out without waiting?
    pub(crate) fn has_capacity(&self) -> bool {
        self.available > 0
    }

    /// Pop the most recently returned idle entry (LIFO).
    pub(crate) fn pop_cache(&mut self) -> Option<Entry<R>> {
        let popped = self.cache.pop();
        if popped.is_some() {
            self.available -= 1;
        }
        self.check_invariants();
        popped
    }

    /// Account for a resource that is about to leave the pool via
    /// creation, without touching the cache.
    pub(crate) fn reserve_for_create(&mut self) {
        debug_assert!(self.available > 0);
        self.available -= 1;
        self.check_invariants();
    }

    /// Restore capacity after a create failure or a destroy, once the
    /// caller (`Pool::release_capacity`) has confirmed no waiter is
    /// queued to hand the freed capacity to directly.
    pub(crate) fn restore(&mut self) {
        debug_assert!(self.available < self.capacity);
        self.available += 1;
        self.check_invariants();
    }

    /// Return-to-cache path (§4.4 step 2): caches the entry and restores
    /// one unit of capacity.
    pub(crate) fn push_cache(&mut self, entry: Entry<R>) {
        debug_assert!(self.waiters.is_empty());
        self.cache.push(entry);
        self.available += 1;
        self.check_invariants();
    }

    pub(crate) fn enqueue_waiter(&mut self, slot: Arc<Slot<R>>) {
        debug_assert_eq!(self.available, 0);
        self.waiters.push_back(slot);
    }

    pub(crate) fn dequeue_waiter(&mut self) -> Option<Arc<Slot<R>>> {
        self.waiters.pop_front()
    }

    /// `destroy_all`: atomically swap the cache for empty, leaving
    /// `available` untouched — it tracks borrowed resources, not cached
    /// ones.
    pub(crate) fn drain_cache(&mut self) -> Vec<Entry<R>> {
        std::mem::take(&mut self.cache)
    }

    /// Reaper sweep: partition the cache into stale entries (removed and
    /// returned for destruction) and fresh ones (kept).
    pub(crate) fn evict_stale(&mut self, now: f64, idle_timeout: f64) -> Vec<Entry<R>> {
        let mut stale = Vec::new();
        let mut fresh = Vec::with_capacity(self.cache.len());
        for entry in self.cache.drain(..) {
            if entry.is_stale(now, idle_timeout) {
                stale.push(entry);
            } else {
                fresh.push(entry);
            }
        }
        self.cache = fresh;
        stale
    }

    #[cfg(debug_assertions)]
    fn check_invariants(&self) {
        debug_assert!(self.available <= self.capacity, "I1/cap: available out of range");
        if self.available == self.capacity {
            debug_assert!(self.waiters.is_empty(), "I2 violated");
        }
        if !self.cache.is_empty() {
            debug_assert!(self.waiters.is_empty(), "I3 violated");
        }
        if self.available > 0 {
            debug_assert!(self.waiters.is_empty(), "I4 violated");
        }
    }

    #[cfg(not(debug_assertions))]
    fn check_invariants(&self) {}
}
