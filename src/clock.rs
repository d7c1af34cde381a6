//! Time sources for the time-bounded replay modes.
//!
//! Entries retained by a time-bounded buffer are stamped with
//! [`Clock::now`] when they are appended, and compared against it again on
//! eviction and when a new subscriber starts replaying.
//!
//! [`ManualClock`] gives tests virtual time that only moves when told to,
//! so age-based eviction can be checked deterministically.

use std::sync::{
  atomic::{AtomicU64, Ordering},
  Arc,
};

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::{Duration, Instant};
#[cfg(target_arch = "wasm32")]
pub use web_time::{Duration, Instant};

/// A source of the current instant.
pub trait Clock: Send + Sync {
  fn now(&self) -> Instant;
}

/// The monotonic system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  #[inline]
  fn now(&self) -> Instant { Instant::now() }
}

/// Virtual time, advanced explicitly.
///
/// Clones share the same timeline, so a test can keep one handle while the
/// subject owns another.
///
/// ```rust
/// use rxreplay::prelude::*;
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.now() - start, Duration::from_millis(250));
/// ```
#[derive(Clone, Debug)]
pub struct ManualClock {
  origin: Instant,
  elapsed_nanos: Arc<AtomicU64>,
}

impl ManualClock {
  pub fn new() -> Self { Self { origin: Instant::now(), elapsed_nanos: Arc::new(AtomicU64::new(0)) } }

  /// Moves virtual time forward by `by`.
  pub fn advance(&self, by: Duration) {
    let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
    let _ = self
      .elapsed_nanos
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| Some(cur.saturating_add(nanos)));
  }

  /// Virtual time passed since the clock was created.
  pub fn elapsed(&self) -> Duration {
    Duration::from_nanos(self.elapsed_nanos.load(Ordering::Acquire))
  }
}

impl Default for ManualClock {
  fn default() -> Self { Self::new() }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant { self.origin + self.elapsed() }
}

/// Whether something stamped at `stamp` has reached `max_age` by `now`.
#[inline]
pub(crate) fn is_expired(stamp: Instant, max_age: Duration, now: Instant) -> bool {
  now.checked_duration_since(stamp).is_some_and(|age| age >= max_age)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxreplay_macro::test]
  fn manual_clock_only_moves_when_advanced() {
    let clock = ManualClock::new();
    let shared = clock.clone();
    let t0 = clock.now();
    assert_eq!(clock.now(), t0);

    shared.advance(Duration::from_secs(3));
    assert_eq!(clock.now() - t0, Duration::from_secs(3));
    assert_eq!(clock.elapsed(), Duration::from_secs(3));
  }

  #[rxreplay_macro::test]
  fn expiry_is_inclusive_at_max_age() {
    let clock = ManualClock::new();
    let stamp = clock.now();
    let max_age = Duration::from_millis(5);

    clock.advance(Duration::from_millis(4));
    assert!(!is_expired(stamp, max_age, clock.now()));
    clock.advance(Duration::from_millis(1));
    assert!(is_expired(stamp, max_age, clock.now()));
    // a stamp from the future is never expired
    assert!(!is_expired(clock.now() + max_age, max_age, clock.now()));
  }
}
