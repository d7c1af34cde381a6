use std::{marker::PhantomData, sync::Arc};

use super::{ReplaySubject, DEFAULT_CHUNK_SIZE};
use crate::{
  buffer::{Accumulator, Fold, ReplayMode, Seed},
  clock::{Clock, SystemClock},
  error::SubjectError,
};

/// Configures a [`ReplaySubject`] before it is built.
///
/// ```rust
/// use rxreplay::prelude::*;
///
/// let clock = ManualClock::new();
/// let subject = ReplaySubject::<u64, ()>::builder()
///   .mode(ReplayMode::SizeAndTimeBound(100, Duration::from_secs(5)))
///   .clock(clock.clone())
///   .build()
///   .unwrap();
/// assert_eq!(subject.mode_name(), "size-and-time-bound");
/// ```
pub struct ReplayBuilder<T, E> {
  mode: ReplayMode,
  clock: Arc<dyn Clock>,
  chunk_size: usize,
  fold: Option<Fold<T>>,
  seed: Option<Seed<T>>,
  _err: PhantomData<fn() -> E>,
}

impl<T, E> ReplayBuilder<T, E> {
  pub(crate) fn new() -> Self {
    Self {
      mode: ReplayMode::Unbounded,
      clock: Arc::new(SystemClock),
      chunk_size: DEFAULT_CHUNK_SIZE,
      fold: None,
      seed: None,
      _err: PhantomData,
    }
  }

  pub fn mode(mut self, mode: ReplayMode) -> Self {
    self.mode = mode;
    self
  }

  /// Time source for the time-bounded modes.
  pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  /// Slots per chunk of the unbounded store.
  pub fn chunk_size(mut self, chunk_size: usize) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  /// Accumulator for [`ReplayMode::Snapshot`].
  pub fn fold(mut self, fold: impl Fn(&T, &T) -> T + Send + Sync + 'static) -> Self {
    self.fold = Some(Arc::new(fold));
    self
  }

  /// Initial state the fold starts from; requires [`fold`](Self::fold).
  pub fn seed(mut self, init: impl Fn() -> T + Send + Sync + 'static) -> Self {
    self.seed = Some(Arc::new(init));
    self
  }

  pub fn build(self) -> Result<ReplaySubject<T, E>, SubjectError>
  where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
  {
    if self.chunk_size == 0 {
      return Err(SubjectError::InvalidConfig("chunk size must be greater than zero"));
    }
    if self.fold.is_some() && self.mode != ReplayMode::Snapshot {
      return Err(SubjectError::InvalidConfig("a fold is only used by the snapshot mode"));
    }
    let accumulator = match (self.fold, self.seed) {
      (Some(fold), seed) => Some(Accumulator::new(fold, seed)),
      (None, Some(_)) => return Err(SubjectError::InvalidConfig("a seed needs a fold")),
      (None, None) => None,
    };
    Ok(ReplaySubject::from_parts(self.mode, self.clock, self.chunk_size, accumulator))
  }
}
