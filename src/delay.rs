//! Sub-millisecond holds for converter settling time.

use std::time::{Duration, Instant};

/// Hold the calling thread for `duration`.
///
/// Spins against the monotonic clock instead of sleeping: the converter's
/// sample-and-hold capacitor settles in tens of microseconds, well under
/// the scheduler's sleep granularity. On a stock (non-realtime) kernel the
/// hold can still overshoot by the length of a preemption.
pub fn settle(duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}
