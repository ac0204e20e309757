/// An idle resource paired with the monotonic time it was returned.
///
/// Entries live in a stripe's LIFO `cache` (§3 of the design notes: LIFO
/// maximizes reuse of recently-warm resources while keeping the coldest
/// one — the tail — the first candidate for reaping).
pub(crate) struct Entry<R> {
    pub(crate) value: R,
    pub(crate) last_used: f64,
}

impl<R> Entry<R> {
    pub(crate) fn new(value: R, last_used: f64) -> Self {
        Entry { value, last_used }
    }

    pub(crate) fn is_stale(&self, now: f64, idle_timeout: f64) -> bool {
        now - self.last_used > idle_timeout
    }
}
