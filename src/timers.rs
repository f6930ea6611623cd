//! Scoped phase timing.

use std::time::{Duration, Instant};

/// Adds the time between construction and drop to `slot`.
///
/// ```rust,ignore
/// let mut authorize = Duration::ZERO;
/// {
///     let _timer = PhaseTimer::new(&mut authorize);
///     authorizer.is_authorized(&request, &entities, &policies);
/// }
/// ```
pub struct PhaseTimer<'a> {
    start: Instant,
    slot: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(slot: &'a mut Duration) -> Self {
        PhaseTimer {
            start: Instant::now(),
            slot,
        }
    }
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        *self.slot += self.start.elapsed();
    }
}

pub(crate) fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
