//! Per-subscriber drain controller.
//!
//! Every trigger (a publish, a `request`, the catch-up on subscribe, an
//! unsubscribe) calls [`Subscriber::drain`]. The `wip` counter elects one
//! runner: a trigger that raises it from zero runs the loop, any other only
//! records that it happened. The runner keeps looping until it can retire
//! every signal it saw, so a trigger arriving mid-pass is never lost and
//! delivery to one observer never overlaps.
//!
//! Once the terminal has been delivered, or the subscriber is cancelled, the
//! runner leaves `wip` raised for good and no later trigger runs again.

use std::{
  cell::UnsafeCell,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

use once_cell::race::OnceBox;
use tracing::{trace, warn};

use crate::{
  buffer::{CatchUp, ReplayBuffer},
  entry::{Entry, Outcome},
  error::DeliveryFailure,
  observer::{BoxedObserver, Observer},
  store::Cursor,
};

/// Demand value meaning "no limit"; it is never decremented.
pub(crate) const UNBOUNDED: u64 = u64::MAX;

struct DrainState<T, E> {
  /// Resolved on the first pass, so a subscriber starts where the buffer is
  /// when it is first drained.
  cursor: Option<Cursor<T, E>>,
  observer: Option<BoxedObserver<'static, T, E>>,
  /// The next value should be the folded snapshot rather than the raw one.
  snapshot_pending: bool,
}

enum Pass {
  /// Everything currently deliverable was delivered.
  Idle,
  /// The subscriber is finished; never drain again.
  Done,
}

pub(crate) struct Subscriber<T, E> {
  id: u64,
  wip: AtomicUsize,
  requested: AtomicU64,
  cancelled: AtomicBool,
  finished: AtomicBool,
  caught_up: AtomicBool,
  /// The panic that cancelled this subscriber, if any.
  failure: OnceBox<DeliveryFailure>,
  state: UnsafeCell<DrainState<T, E>>,
}

// SAFETY: `state` is only touched by the thread that raised `wip` from zero,
// and that thread has exclusive access until it lowers it back to zero. The
// cursor shares store nodes with other threads, so `T` and `E` must be
// `Send + Sync`; the observer is `Send`.
unsafe impl<T: Send + Sync, E: Send + Sync> Sync for Subscriber<T, E> {}
unsafe impl<T: Send + Sync, E: Send + Sync> Send for Subscriber<T, E> {}

impl<T, E> Subscriber<T, E>
where
  T: Clone,
  E: Clone,
{
  pub(crate) fn new(id: u64, observer: BoxedObserver<'static, T, E>, demand: u64, catch_up: CatchUp) -> Self {
    Self {
      id,
      wip: AtomicUsize::new(0),
      requested: AtomicU64::new(demand),
      cancelled: AtomicBool::new(false),
      finished: AtomicBool::new(false),
      caught_up: AtomicBool::new(false),
      failure: OnceBox::new(),
      state: UnsafeCell::new(DrainState {
        cursor: None,
        observer: Some(observer),
        snapshot_pending: catch_up == CatchUp::Snapshot,
      }),
    }
  }

  #[inline]
  pub(crate) fn id(&self) -> u64 { self.id }

  #[inline]
  pub(crate) fn requested(&self) -> u64 { self.requested.load(Ordering::Acquire) }

  #[inline]
  pub(crate) fn is_caught_up(&self) -> bool { self.caught_up.load(Ordering::Acquire) }

  #[inline]
  pub(crate) fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }

  /// Cancelled, or the terminal was delivered.
  #[inline]
  pub(crate) fn is_done(&self) -> bool { self.is_cancelled() || self.finished.load(Ordering::Acquire) }

  /// Adds `n` to the outstanding demand, saturating at unbounded.
  pub(crate) fn add_demand(&self, n: u64) {
    let _ = self.requested.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
      (current != UNBOUNDED).then(|| current.saturating_add(n))
    });
  }

  fn produced(&self, emitted: u64) {
    let _ = self.requested.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
      (current != UNBOUNDED).then(|| current - emitted)
    });
  }

  #[inline]
  pub(crate) fn failure(&self) -> Option<&DeliveryFailure> { self.failure.get() }

  /// Marks the subscriber cancelled; `true` for the first caller only.
  pub(crate) fn cancel(&self) -> bool { !self.cancelled.swap(true, Ordering::AcqRel) }

  /// Delivers what demand allows, or joins a drain already running.
  ///
  /// A panicking callback cancels this subscriber and is reported as the
  /// returned failure.
  pub(crate) fn drain(&self, buffer: &ReplayBuffer<T, E>) -> Result<(), DeliveryFailure> {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return Ok(());
    }
    let mut missed = 1;
    loop {
      // SAFETY: `wip` is non-zero and was raised from zero by this thread.
      let state = unsafe { &mut *self.state.get() };
      match catch_unwind(AssertUnwindSafe(|| self.drain_pass(state, buffer))) {
        Ok(Pass::Idle) => {}
        Ok(Pass::Done) => return Ok(()),
        Err(payload) => {
          self.cancelled.store(true, Ordering::Release);
          let failure = DeliveryFailure::from_panic(self.id, payload);
          warn!(subscriber = self.id, message = %failure.message, "subscriber callback panicked, cancelling it");
          let _ = self.failure.set(Box::new(failure.clone()));
          // the observer may be mid-update; drop it without calling it again
          let _ = catch_unwind(AssertUnwindSafe(|| {
            state.observer = None;
            state.cursor = None;
          }));
          return Err(failure);
        }
      }
      let prev = self.wip.fetch_sub(missed, Ordering::AcqRel);
      missed = prev - missed;
      if missed == 0 {
        return Ok(());
      }
    }
  }

  fn drain_pass(&self, state: &mut DrainState<T, E>, buffer: &ReplayBuffer<T, E>) -> Pass {
    if self.is_cancelled() {
      state.observer = None;
      state.cursor = None;
      return Pass::Done;
    }
    let DrainState { cursor, observer, snapshot_pending } = state;
    let cursor = cursor.get_or_insert_with(|| buffer.cursor());
    let Some(sink) = observer.as_mut() else { return Pass::Done };

    let requested = self.requested();
    let mut emitted = 0_u64;
    let pass = loop {
      if self.is_cancelled() || sink.is_closed() {
        self.cancelled.store(true, Ordering::Release);
        *observer = None;
        break Pass::Done;
      }
      match cursor.peek() {
        None => {
          if !self.caught_up.swap(true, Ordering::AcqRel) {
            trace!(subscriber = self.id, position = cursor.position(), "caught up with the buffer");
          }
          break Pass::Idle;
        }
        Some(Entry::Terminal(outcome)) => {
          let outcome = outcome.clone();
          cursor.advance();
          self.caught_up.store(true, Ordering::Release);
          self.finished.store(true, Ordering::Release);
          if let Some(sink) = observer.take() {
            match outcome {
              Outcome::Completed => sink.complete(),
              Outcome::Failed(err) => sink.error(err),
            }
          }
          break Pass::Done;
        }
        Some(Entry::Value(_)) => {
          if emitted == requested {
            break Pass::Idle;
          }
          if let Some(value) = cursor.next_value(*snapshot_pending) {
            *snapshot_pending = false;
            emitted += 1;
            sink.next(value);
          }
        }
      }
    };
    if emitted > 0 {
      self.produced(emitted);
    }
    pass
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::{
    buffer::{Accumulator, ReplayMode},
    clock::SystemClock,
    observer::FnMutObserver,
  };

  fn buffer(mode: ReplayMode) -> ReplayBuffer<u32, ()> { ReplayBuffer::new(mode, Arc::new(SystemClock), 4, None) }

  fn recording(demand: u64, catch_up: CatchUp) -> (Subscriber<u32, ()>, Arc<Mutex<Vec<u32>>>) {
    let seen = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();
    let observer = Box::new(FnMutObserver(move |v| sink.lock().unwrap().push(v)));
    (Subscriber::new(0, observer, demand, catch_up), seen)
  }

  #[rxreplay_macro::test]
  fn delivers_no_more_than_requested() {
    let b = buffer(ReplayMode::Unbounded);
    let (s, seen) = recording(2, CatchUp::Replay);
    for i in 0..5 {
      b.append(i);
    }
    s.drain(&b).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    assert_eq!(s.requested(), 0);
    assert!(!s.is_caught_up());

    s.add_demand(10);
    s.drain(&b).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(s.requested(), 7);
    assert!(s.is_caught_up());
  }

  #[rxreplay_macro::test]
  fn unbounded_demand_is_never_consumed() {
    let b = buffer(ReplayMode::Unbounded);
    let (s, _) = recording(UNBOUNDED, CatchUp::Replay);
    b.append(1);
    s.drain(&b).unwrap();
    assert_eq!(s.requested(), UNBOUNDED);
    s.add_demand(3);
    assert_eq!(s.requested(), UNBOUNDED);
  }

  #[rxreplay_macro::test]
  fn demand_saturates() {
    let (s, _) = recording(u64::MAX - 1, CatchUp::Replay);
    s.add_demand(5);
    assert_eq!(s.requested(), UNBOUNDED);
  }

  #[rxreplay_macro::test]
  fn terminal_needs_no_demand() {
    let b = buffer(ReplayMode::SizeBound(2));
    let (s, seen) = recording(0, CatchUp::Replay);
    b.terminate(Outcome::Completed);
    s.drain(&b).unwrap();
    assert!(seen.lock().unwrap().is_empty());
    assert!(s.is_done());
    // finished subscribers never run again
    s.add_demand(1);
    s.drain(&b).unwrap();
  }

  #[rxreplay_macro::test]
  fn panic_is_reported_and_cancels() {
    let b = buffer(ReplayMode::Unbounded);
    let observer = Box::new(FnMutObserver(|v: u32| {
      if v == 1 {
        panic!("bad value {v}");
      }
    }));
    let s = Subscriber::<u32, ()>::new(7, observer, UNBOUNDED, CatchUp::Replay);
    b.append(0);
    b.append(1);
    let failure = s.drain(&b).unwrap_err();
    assert_eq!(failure.subscriber, 7);
    assert_eq!(failure.message, "bad value 1");
    assert!(s.is_cancelled());
    assert_eq!(s.failure(), Some(&failure));
    b.append(2);
    assert!(s.drain(&b).is_ok());
  }

  #[rxreplay_macro::test]
  fn snapshot_catch_up_starts_with_the_fold() {
    let acc = Accumulator::new(Arc::new(|acc: &u32, v: &u32| acc + v), None);
    let b: ReplayBuffer<u32, ()> = ReplayBuffer::new(ReplayMode::Snapshot, Arc::new(SystemClock), 4, Some(acc));
    for i in 1..=3 {
      b.append(i);
    }
    let (s, seen) = recording(UNBOUNDED, b.catch_up());
    s.drain(&b).unwrap();
    b.append(10);
    s.drain(&b).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![6, 10]);
  }
}
