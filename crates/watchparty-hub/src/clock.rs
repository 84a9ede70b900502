//! Time source for play scheduling and clock sync.

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in seconds since the Unix epoch.
///
/// Clients compare these values against their own wall clocks, so this
/// must be epoch-based rather than monotonic.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> f64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

/// Any `Fn() -> f64` is a clock. Handy for pinning time in tests.
impl<F> Clock for F
where
    F: Fn() -> f64 + Send + Sync + 'static,
{
    fn now(&self) -> f64 {
        self()
    }
}
