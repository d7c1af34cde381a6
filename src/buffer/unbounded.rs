use once_cell::race::OnceBox;
use tracing::trace;

use crate::{
  entry::{Entry, Outcome},
  store::{ChunkCursor, ChunkedStore},
};

/// Keeps every value in a [`ChunkedStore`]; nothing is ever evicted.
pub(crate) struct UnboundedBuffer<T, E> {
  store: ChunkedStore<T, E>,
  outcome: OnceBox<Outcome<E>>,
}

impl<T, E> UnboundedBuffer<T, E>
where
  T: Clone,
  E: Clone,
{
  pub(crate) fn new(chunk_size: usize) -> Self {
    Self { store: ChunkedStore::new(chunk_size), outcome: OnceBox::new() }
  }

  pub(crate) fn append(&self, value: T) -> bool {
    if self.outcome.get().is_some() {
      return false;
    }
    self.store.append(Entry::Value(value));
    true
  }

  pub(crate) fn terminate(&self, outcome: Outcome<E>) -> bool {
    if self.outcome.set(Box::new(outcome.clone())).is_err() {
      return false;
    }
    let index = self.store.append(Entry::Terminal(outcome));
    trace!(index, "terminal appended");
    true
  }

  #[inline]
  pub(crate) fn outcome(&self) -> Option<&Outcome<E>> { self.outcome.get() }

  #[inline]
  pub(crate) fn size(&self) -> usize { self.store.len() }

  pub(crate) fn snapshot(&self) -> Vec<T> {
    let mut cursor = self.store.cursor();
    let mut values = Vec::with_capacity(self.store.len());
    while let Some(Entry::Value(v)) = cursor.peek() {
      values.push(v.clone());
      cursor.advance();
    }
    values
  }

  pub(crate) fn latest(&self) -> Option<T> {
    let len = self.store.len();
    if len == 0 {
      return None;
    }
    self.store.value_at(len - 1)
  }

  pub(crate) fn cursor(&self) -> ChunkCursor<T, E> { self.store.cursor() }
}
