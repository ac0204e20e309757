use std::sync::OnceLock;
use std::time::Instant;

/// Monotonic seconds as a floating-point value (§6: "Clock: monotonic
/// seconds"), measured from the first call into this crate. Never
/// meaningful across process restarts, matching `Entry::last_used`'s
/// contract.
pub(crate) fn now() -> f64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_secs_f64()
}
