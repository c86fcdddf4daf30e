//! Time source used to measure request duration.

use std::time::Instant;

/// Source of the current instant.
///
/// The middleware reads the clock once when a request is dispatched and once when its
/// record is flushed. Any `Fn() -> Instant` closure is a clock, which lets tests script
/// elapsed time without sleeping.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> Instant + Send + Sync + 'static,
{
    fn now(&self) -> Instant {
        self()
    }
}
