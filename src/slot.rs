use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// How often a blocked waiter re-checks its cancellation flag. This is the
/// practical stand-in, on a blocking-thread model with no first-class
/// asynchronous interrupt, for the "asynchronous-interrupt masking" the
/// design calls for (see `DESIGN.md`): it bounds cancellation latency
/// instead of delivering it instantaneously.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

enum State<R> {
    Empty,
    Filled(R),
    /// The waiter has been granted the freed capacity itself (§4.5): no
    /// value is handed over, the waiter must run its own `create` now.
    Proceed,
    Tombstone,
}

/// A single-shot rendezvous cell used either to hand a resource from a
/// returning producer to a waiting consumer, or to grant a waiter
/// permission to create its own resource when capacity frees up with no
/// value to hand over (a `destroy` or a failed `create`).
///
/// A `Slot` is created fresh for each waiter and discarded after its one
/// use; it is never recycled.
pub(crate) struct Slot<R> {
    state: Mutex<State<R>>,
    cv: Condvar,
}

/// What a waiter observed after blocking on a `Slot`.
pub(crate) enum WaitOutcome<R> {
    /// A producer handed off a resource and no cancellation raced it.
    Resource(R),
    /// The waiter cancelled before any producer arrived; the slot is now
    /// tombstoned so the next producer skips it.
    Cancelled,
    /// The waiter cancelled, but a producer had already filled the slot.
    /// The caller must re-publish this resource via the return protocol
    /// rather than keep it, or it would leak.
    CancelledWithResource(R),
    /// Capacity was freed straight to this waiter with no value attached;
    /// the caller must run its own `create` now, as if it had just found
    /// the stripe uncontended.
    Retry,
    /// The waiter cancelled, but only after being granted the freed
    /// capacity. The caller must restore that capacity itself (no one
    /// else knows it was ever handed out) before returning `Cancelled`.
    CancelledAfterRetry,
}

impl<R> Slot<R> {
    pub(crate) fn new() -> Self {
        Slot {
            state: Mutex::new(State::Empty),
            cv: Condvar::new(),
        }
    }

    /// Producer side: try to hand `value` to whoever is waiting on this
    /// slot. Returns `Err(value)` if the slot was already tombstoned by a
    /// cancelled waiter, so the caller can try the next waiter in line.
    pub(crate) fn fill(&self, value: R) -> Result<(), R> {
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Tombstone => Err(value),
            State::Empty => {
                *state = State::Filled(value);
                drop(state);
                self.cv.notify_all();
                Ok(())
            }
            State::Filled(_) | State::Proceed => {
                unreachable!("a Slot may only be resolved once")
            }
        }
    }

    /// Producer side: grant this waiter the capacity that just freed up,
    /// with no value attached (§4.5's "a concurrent acquirer can create a
    /// replacement without waiting"). Returns `false` if the slot was
    /// already tombstoned, so the caller can try the next waiter, or
    /// restore the capacity itself if none remain.
    pub(crate) fn signal_retry(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Tombstone => false,
            State::Empty => {
                *state = State::Proceed;
                drop(state);
                self.cv.notify_all();
                true
            }
            State::Filled(_) | State::Proceed => {
                unreachable!("a Slot may only be resolved once")
            }
        }
    }

    /// Consumer side: block until a resource arrives, capacity is handed
    /// over, or `cancel` becomes set. `cancel` is checked between waits,
    /// not interrupted instantly.
    pub(crate) fn wait(&self, cancel: &AtomicBool) -> WaitOutcome<R> {
        let mut state = self.state.lock().unwrap();
        loop {
            if matches!(*state, State::Filled(_)) {
                let prev = std::mem::replace(&mut *state, State::Empty);
                if let State::Filled(v) = prev {
                    if cancel.load(Ordering::Acquire) {
                        return WaitOutcome::CancelledWithResource(v);
                    }
                    return WaitOutcome::Resource(v);
                }
                unreachable!();
            }
            if matches!(*state, State::Proceed) {
                if cancel.load(Ordering::Acquire) {
                    return WaitOutcome::CancelledAfterRetry;
                }
                return WaitOutcome::Retry;
            }
            if cancel.load(Ordering::Acquire) {
                *state = State::Tombstone;
                return WaitOutcome::Cancelled;
            }
            let (guard, _timeout) = self.cv.wait_timeout(state, CANCEL_POLL_INTERVAL).unwrap();
            state = guard;
        }
    }
}
