//! The replay subject.
//!
//! A [`ReplaySubject`] is a publisher-facing sink and a multi-subscriber
//! source at the same time. Published values are appended to a replay buffer
//! and then fanned out to the subscribers registered at that moment; a
//! subscriber arriving later first replays what the buffer retained.
//!
//! ```rust
//! use rxreplay::prelude::*;
//!
//! let subject = ReplaySubject::<&str, ()>::size_bound(2);
//! subject.next("a").unwrap();
//! subject.next("b").unwrap();
//! subject.next("c").unwrap();
//!
//! let late = subject.subscribe_fn(|v| println!("{v}"));
//! // prints "b" then "c"
//! subject.complete().unwrap();
//! assert!(late.is_closed());
//! ```

mod builder;
mod registry;
mod subscriber;
mod subscription;

use std::sync::{
  atomic::{AtomicU64, Ordering},
  Arc,
};

pub use builder::ReplayBuilder;
use registry::Registry;
pub(crate) use subscriber::Subscriber;
use subscriber::UNBOUNDED;
pub use subscription::ReplaySubscription;
use tracing::{debug, warn};

use crate::{
  buffer::{Accumulator, ReplayBuffer, ReplayMode},
  clock::{Clock, Duration, SystemClock},
  entry::Outcome,
  error::{DeliveryError, SubjectError},
  observer::{FnMutObserver, Observer},
};

/// Default slot count of one chunk of the unbounded store.
pub const DEFAULT_CHUNK_SIZE: usize = 16;

pub(crate) struct SubjectCore<T, E> {
  pub(crate) buffer: ReplayBuffer<T, E>,
  pub(crate) registry: Registry<Subscriber<T, E>>,
  next_id: AtomicU64,
}

impl<T, E> SubjectCore<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  /// Drains every subscriber in `subscribers`, collecting callback failures
  /// instead of stopping at the first one.
  pub(crate) fn fan_out(&self, subscribers: &[Arc<Subscriber<T, E>>]) -> Result<(), SubjectError> {
    let mut failures = DeliveryError::default();
    for subscriber in subscribers {
      if let Err(failure) = self.buffer.drain(subscriber) {
        failures.push(failure);
      }
      self.detach_if_done(subscriber);
    }
    failures.into_result()
  }

  pub(crate) fn detach_if_done(&self, subscriber: &Arc<Subscriber<T, E>>) {
    if subscriber.is_done() && self.registry.remove(subscriber) {
      debug!(subscriber = subscriber.id(), "subscriber detached");
    }
  }

  fn terminate(&self, outcome: Outcome<E>) -> Result<(), SubjectError> {
    let failed = outcome.is_failed();
    if !self.buffer.terminate(outcome) {
      debug!(mode = self.buffer.mode_name(), "subject already terminated, ignoring");
      return Ok(());
    }
    let last = self.registry.terminate();
    debug!(mode = self.buffer.mode_name(), failed, subscribers = last.len(), "subject terminated");
    self.fan_out(&last)
  }
}

/// A broadcast subject that replays retained history to late subscribers
/// and honors each subscriber's demand.
///
/// Cloning gives another handle to the same subject.
pub struct ReplaySubject<T, E> {
  core: Arc<SubjectCore<T, E>>,
}

impl<T, E> Clone for ReplaySubject<T, E> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<T, E> ReplaySubject<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  pub(crate) fn from_parts(
    mode: ReplayMode,
    clock: Arc<dyn Clock>,
    chunk_size: usize,
    accumulator: Option<Accumulator<T>>,
  ) -> Self {
    let core = SubjectCore {
      buffer: ReplayBuffer::new(mode, clock, chunk_size, accumulator),
      registry: Registry::new(),
      next_id: AtomicU64::new(0),
    };
    Self { core: Arc::new(core) }
  }

  /// Keeps every value ever published.
  pub fn unbounded() -> Self {
    Self::from_parts(ReplayMode::Unbounded, Arc::new(SystemClock), DEFAULT_CHUNK_SIZE, None)
  }

  /// No history: only live values are delivered.
  pub fn publish() -> Self { Self::size_bound(0) }

  /// Keeps the most recent `n` values.
  pub fn size_bound(n: usize) -> Self {
    Self::from_parts(ReplayMode::SizeBound(n), Arc::new(SystemClock), DEFAULT_CHUNK_SIZE, None)
  }

  /// Keeps values younger than `max_age`, measured with `clock`.
  pub fn time_bound(max_age: Duration, clock: impl Clock + 'static) -> Self {
    Self::from_parts(ReplayMode::TimeBound(max_age), Arc::new(clock), DEFAULT_CHUNK_SIZE, None)
  }

  /// Keeps at most `n` values, each younger than `max_age`.
  pub fn size_and_time_bound(n: usize, max_age: Duration, clock: impl Clock + 'static) -> Self {
    Self::from_parts(ReplayMode::SizeAndTimeBound(n, max_age), Arc::new(clock), DEFAULT_CHUNK_SIZE, None)
  }

  /// Keeps only the latest value; a new subscriber receives it first.
  pub fn snapshot() -> Self {
    Self::from_parts(ReplayMode::Snapshot, Arc::new(SystemClock), DEFAULT_CHUNK_SIZE, None)
  }

  /// Keeps the running fold of every value published so far. A new
  /// subscriber receives the fold first and then the raw values published
  /// after it.
  pub fn snapshot_with(fold: impl Fn(&T, &T) -> T + Send + Sync + 'static) -> Self {
    let acc = Accumulator::new(Arc::new(fold), None);
    Self::from_parts(ReplayMode::Snapshot, Arc::new(SystemClock), DEFAULT_CHUNK_SIZE, Some(acc))
  }

  /// Like [`snapshot_with`](Self::snapshot_with), but the first value is
  /// folded into `init()` instead of being taken as is.
  pub fn snapshot_seeded(
    init: impl Fn() -> T + Send + Sync + 'static,
    fold: impl Fn(&T, &T) -> T + Send + Sync + 'static,
  ) -> Self {
    let acc = Accumulator::new(Arc::new(fold), Some(Arc::new(init)));
    Self::from_parts(ReplayMode::Snapshot, Arc::new(SystemClock), DEFAULT_CHUNK_SIZE, Some(acc))
  }

  pub fn builder() -> ReplayBuilder<T, E> { ReplayBuilder::new() }

  // ==========================================================================
  // Publishing
  // ==========================================================================

  /// Publishes `value` to the buffer and every current subscriber.
  ///
  /// Fails with [`SubjectError::Terminated`] after termination, dropping
  /// the value, and with [`SubjectError::Delivery`] if some subscriber's
  /// callback panicked. The value is published either way.
  pub fn next(&self, value: T) -> Result<(), SubjectError> {
    if !self.core.buffer.append(value) {
      warn!(mode = self.core.buffer.mode_name(), "value published after termination was dropped");
      return Err(SubjectError::Terminated);
    }
    self.core.fan_out(&self.core.registry.snapshot())
  }

  /// Terminates the subject with `err`. A second termination is a no-op.
  pub fn error(&self, err: E) -> Result<(), SubjectError> { self.core.terminate(Outcome::Failed(err)) }

  /// Completes the subject. A second termination is a no-op.
  pub fn complete(&self) -> Result<(), SubjectError> { self.core.terminate(Outcome::Completed) }

  // ==========================================================================
  // Subscribing
  // ==========================================================================

  /// Subscribes with unbounded demand.
  pub fn subscribe<O>(&self, observer: O) -> ReplaySubscription<T, E>
  where
    O: Observer<T, E> + Send + 'static,
  {
    self.subscribe_with_demand(observer, UNBOUNDED)
  }

  /// Subscribes a closure receiving values only.
  pub fn subscribe_fn<F>(&self, next: F) -> ReplaySubscription<T, E>
  where
    F: FnMut(T) + Send + 'static,
  {
    self.subscribe(FnMutObserver(next))
  }

  /// Subscribes with an initial demand of `demand` values; more is granted
  /// with [`ReplaySubscription::request`].
  ///
  /// The retained history is replayed right away, as far as `demand`
  /// allows. A subscriber arriving after termination receives the frozen
  /// history and the terminal. A panic while replaying cancels the
  /// subscriber and is kept on the handle, see
  /// [`ReplaySubscription::failure`].
  pub fn subscribe_with_demand<O>(&self, observer: O, demand: u64) -> ReplaySubscription<T, E>
  where
    O: Observer<T, E> + Send + 'static,
  {
    let core = &self.core;
    let id = core.next_id.fetch_add(1, Ordering::Relaxed);
    let subscriber = Arc::new(Subscriber::new(id, Box::new(observer), demand, core.buffer.catch_up()));
    let live = core.registry.add(subscriber.clone());
    debug!(subscriber = id, live, demand, mode = core.buffer.mode_name(), "subscribed");

    if let Err(failure) = core.buffer.drain(&subscriber) {
      debug!(subscriber = id, message = %failure.message, "catch-up failed, failure kept on the handle");
    }
    core.detach_if_done(&subscriber);
    ReplaySubscription::new(subscriber, core.clone())
  }

  // ==========================================================================
  // Introspection
  // ==========================================================================

  /// Subscribers currently receiving live values.
  #[inline]
  pub fn subscriber_count(&self) -> usize { self.core.registry.len() }

  #[inline]
  pub fn has_observers(&self) -> bool { self.subscriber_count() > 0 }

  #[inline]
  pub fn is_terminated(&self) -> bool { self.core.buffer.is_terminated() }

  pub fn has_completed(&self) -> bool { matches!(self.core.buffer.outcome(), Some(Outcome::Completed)) }

  pub fn has_error(&self) -> bool { self.core.buffer.outcome().is_some_and(Outcome::is_failed) }

  /// The error the subject failed with.
  pub fn error_value(&self) -> Option<E> { self.core.buffer.outcome().and_then(Outcome::error).cloned() }

  /// Number of values a subscriber arriving now would replay.
  pub fn size(&self) -> usize { self.core.buffer.size() }

  pub fn has_value(&self) -> bool { self.size() > 0 }

  /// The values a subscriber arriving now would replay, in order.
  pub fn values(&self) -> Vec<T> { self.core.buffer.snapshot() }

  /// The most recent retained value.
  pub fn latest(&self) -> Option<T> { self.core.buffer.latest() }

  pub fn mode_name(&self) -> &'static str { self.core.buffer.mode_name() }
}
