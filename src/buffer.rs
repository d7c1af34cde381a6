//! Replay buffers: a store, an eviction policy and the terminal latch behind
//! one contract.
//!
//! | Mode | Store | Eviction |
//! |------|-------|----------|
//! | [`ReplayMode::Unbounded`] | chunked | none |
//! | [`ReplayMode::SizeBound`] | linked | `SizeBound(n)` |
//! | [`ReplayMode::TimeBound`] | linked, time-stamped | `Paired(KeepAll, TimeBound)` |
//! | [`ReplayMode::SizeAndTimeBound`] | linked, time-stamped | `Paired(SizeBound, TimeBound)` |
//! | [`ReplayMode::Snapshot`] | linked | `SizeBound(1)`, folded |
//!
//! Every variant reads the same way: a subscriber gets a cursor from
//! `ReplayBuffer::cursor` and walks it forward; the terminal entry is the
//! last thing it can ever see.

mod bounded;
mod unbounded;

use std::sync::Arc;

pub(crate) use bounded::BoundedBuffer;
pub(crate) use unbounded::UnboundedBuffer;

use crate::{
  clock::{Clock, Duration},
  entry::Outcome,
  eviction::{KeepAll, Paired, SizeBound, TimeBound},
  error::DeliveryFailure,
  store::Cursor,
  subject::Subscriber,
};

/// Fold used by [`ReplayMode::Snapshot`]: folds the previous snapshot
/// and a new value into the next snapshot.
pub type Fold<T> = Arc<dyn Fn(&T, &T) -> T + Send + Sync>;

/// Produces the state a [`Fold`] starts from.
pub type Seed<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A fold and the optional seed of its first step.
pub(crate) struct Accumulator<T> {
  fold: Fold<T>,
  seed: Option<Seed<T>>,
}

impl<T: Clone> Accumulator<T> {
  pub(crate) fn new(fold: Fold<T>, seed: Option<Seed<T>>) -> Self { Self { fold, seed } }

  /// The snapshot after `value`, given the snapshot before it. Without a
  /// previous snapshot the seed is folded in, or `value` itself is taken.
  pub(crate) fn accumulate(&self, prev: Option<&T>, value: &T) -> T {
    match (prev, &self.seed) {
      (Some(prev), _) => (self.fold)(prev, value),
      (None, Some(seed)) => (self.fold)(&seed(), value),
      (None, None) => value.clone(),
    }
  }
}

/// How much history a subject keeps for late subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayMode {
  /// Every value is kept.
  Unbounded,
  /// The most recent `n` values are kept.
  SizeBound(usize),
  /// Values younger than the given age are kept.
  TimeBound(Duration),
  /// At most `n` values, each younger than the given age.
  SizeAndTimeBound(usize, Duration),
  /// Only the latest value (or the running fold of all values) is kept; a
  /// new subscriber receives it first and then the live values.
  Snapshot,
}

/// How a fresh subscriber starts consuming the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CatchUp {
  /// Replay everything retained, in order.
  Replay,
  /// Deliver the retained snapshot, then live values only.
  Snapshot,
}

pub(crate) enum ReplayBuffer<T, E> {
  Unbounded(UnboundedBuffer<T, E>),
  SizeBound(BoundedBuffer<T, E, SizeBound>),
  TimeBound(BoundedBuffer<T, E, Paired<KeepAll, TimeBound>>),
  SizeAndTimeBound(BoundedBuffer<T, E, Paired<SizeBound, TimeBound>>),
  Snapshot(BoundedBuffer<T, E, SizeBound>),
}

macro_rules! each_buffer {
  ($buffer:expr, $b:ident => $body:expr) => {
    match $buffer {
      ReplayBuffer::Unbounded($b) => $body,
      ReplayBuffer::SizeBound($b) => $body,
      ReplayBuffer::TimeBound($b) => $body,
      ReplayBuffer::SizeAndTimeBound($b) => $body,
      ReplayBuffer::Snapshot($b) => $body,
    }
  };
}

impl<T, E> ReplayBuffer<T, E>
where
  T: Clone,
  E: Clone,
{
  pub(crate) fn new(
    mode: ReplayMode,
    clock: Arc<dyn Clock>,
    chunk_size: usize,
    accumulator: Option<Accumulator<T>>,
  ) -> Self {
    match mode {
      ReplayMode::Unbounded => ReplayBuffer::Unbounded(UnboundedBuffer::new(chunk_size)),
      ReplayMode::SizeBound(n) => ReplayBuffer::SizeBound(BoundedBuffer::new(SizeBound::new(n), clock)),
      ReplayMode::TimeBound(max_age) => {
        ReplayBuffer::TimeBound(BoundedBuffer::new(Paired(KeepAll, TimeBound::new(max_age)), clock))
      }
      ReplayMode::SizeAndTimeBound(n, max_age) => ReplayBuffer::SizeAndTimeBound(BoundedBuffer::new(
        Paired(SizeBound::new(n), TimeBound::new(max_age)),
        clock,
      )),
      ReplayMode::Snapshot => {
        ReplayBuffer::Snapshot(BoundedBuffer::new(SizeBound::new(1), clock).with_accumulator(accumulator))
      }
    }
  }

  pub(crate) fn mode_name(&self) -> &'static str {
    match self {
      ReplayBuffer::Unbounded(_) => "unbounded",
      ReplayBuffer::SizeBound(_) => "size-bound",
      ReplayBuffer::TimeBound(_) => "time-bound",
      ReplayBuffer::SizeAndTimeBound(_) => "size-and-time-bound",
      ReplayBuffer::Snapshot(_) => "snapshot",
    }
  }

  /// Appends a value; `false` if the buffer is already terminated.
  pub(crate) fn append(&self, value: T) -> bool { each_buffer!(self, b => b.append(value)) }

  /// Appends the terminal entry; `false` if one was already appended.
  pub(crate) fn terminate(&self, outcome: Outcome<E>) -> bool { each_buffer!(self, b => b.terminate(outcome)) }

  pub(crate) fn is_terminated(&self) -> bool { each_buffer!(self, b => b.outcome().is_some()) }

  pub(crate) fn outcome(&self) -> Option<&Outcome<E>> { each_buffer!(self, b => b.outcome()) }

  /// Number of values a subscriber starting now would replay.
  pub(crate) fn size(&self) -> usize { each_buffer!(self, b => b.size()) }

  /// The values a subscriber starting now would replay, in order.
  pub(crate) fn snapshot(&self) -> Vec<T> { each_buffer!(self, b => b.snapshot()) }

  pub(crate) fn latest(&self) -> Option<T> { each_buffer!(self, b => b.latest()) }

  /// A cursor positioned where a new subscriber starts.
  pub(crate) fn cursor(&self) -> Cursor<T, E> {
    match self {
      ReplayBuffer::Unbounded(b) => Cursor::Chunked(b.cursor()),
      ReplayBuffer::SizeBound(b) => Cursor::Linked(b.cursor()),
      ReplayBuffer::TimeBound(b) => Cursor::Linked(b.cursor()),
      ReplayBuffer::SizeAndTimeBound(b) => Cursor::Linked(b.cursor()),
      ReplayBuffer::Snapshot(b) => Cursor::Linked(b.cursor()),
    }
  }

  pub(crate) fn catch_up(&self) -> CatchUp {
    match self {
      ReplayBuffer::Snapshot(_) => CatchUp::Snapshot,
      _ => CatchUp::Replay,
    }
  }

  /// Delivers to `subscriber` as much as its demand allows.
  #[inline]
  pub(crate) fn drain(&self, subscriber: &Subscriber<T, E>) -> Result<(), DeliveryFailure> { subscriber.drain(self) }
}
