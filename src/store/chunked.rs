use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use arc_swap::{ArcSwap, ArcSwapOption};
use once_cell::race::OnceBox;

use crate::entry::Entry;

/// A fixed-size block of write-once slots.
///
/// `base` is the absolute index of the first slot. When the last slot is
/// claimed the writer links the successor chunk through `next`.
pub(crate) struct Chunk<T, E> {
  base: usize,
  slots: Box<[OnceBox<Entry<T, E>>]>,
  next: ArcSwapOption<Chunk<T, E>>,
}

impl<T, E> Chunk<T, E> {
  fn new(base: usize, capacity: usize) -> Self {
    let slots = (0..capacity).map(|_| OnceBox::new()).collect();
    Self { base, slots, next: ArcSwapOption::empty() }
  }

  #[inline]
  fn capacity(&self) -> usize { self.slots.len() }

  #[inline]
  fn end(&self) -> usize { self.base + self.capacity() }

  /// The next chunk, allocating and linking it if nobody has yet.
  fn successor(&self) -> Arc<Self> {
    if let Some(next) = self.next.load_full() {
      return next;
    }
    let fresh = Arc::new(Chunk::new(self.end(), self.capacity()));
    let prev = self.next.compare_and_swap(&None::<Arc<Self>>, Some(fresh.clone()));
    (*prev).clone().unwrap_or(fresh)
  }
}

impl<T, E> Drop for Chunk<T, E> {
  fn drop(&mut self) {
    let mut next = self.next.swap(None);
    while let Some(chunk) = next {
      match Arc::try_unwrap(chunk) {
        Ok(chunk) => next = chunk.next.swap(None),
        Err(_) => break,
      }
    }
  }
}

/// Unbounded append-only store made of linked fixed-size chunks.
///
/// Growing never copies: a full chunk gets a successor instead. Every append
/// claims a unique index, writes the slot and then bumps the value count;
/// the slot write is itself the release that makes the entry visible, so
/// readers never need the count to walk safely.
pub(crate) struct ChunkedStore<T, E> {
  head: Arc<Chunk<T, E>>,
  tail: ArcSwap<Chunk<T, E>>,
  claimed: AtomicUsize,
  values: AtomicUsize,
}

impl<T, E> ChunkedStore<T, E> {
  pub(crate) fn new(chunk_size: usize) -> Self {
    let head = Arc::new(Chunk::new(0, chunk_size.max(1)));
    Self {
      tail: ArcSwap::new(head.clone()),
      head,
      claimed: AtomicUsize::new(0),
      values: AtomicUsize::new(0),
    }
  }

  /// Appends `entry` and returns its absolute index.
  pub(crate) fn append(&self, entry: Entry<T, E>) -> usize {
    let index = self.claimed.fetch_add(1, Ordering::AcqRel);
    let hint = self.tail.load_full();
    let mut chunk = if index < hint.base { self.head.clone() } else { hint.clone() };
    while index >= chunk.end() {
      chunk = chunk.successor();
    }
    if chunk.base > hint.base {
      let _ = self.tail.compare_and_swap(&hint, chunk.clone());
    }
    let is_value = !entry.is_terminal();
    // indices are unique, so the slot is always still empty here
    let _ = chunk.slots[index - chunk.base].set(Box::new(entry));
    if is_value {
      self.values.fetch_add(1, Ordering::Release);
    }
    index
  }

  /// Number of value entries written so far.
  #[inline]
  pub(crate) fn len(&self) -> usize { self.values.load(Ordering::Acquire) }

  /// The value at absolute `index`, if one has been written there.
  pub(crate) fn value_at(&self, index: usize) -> Option<T>
  where
    T: Clone,
  {
    let mut chunk = self.head.clone();
    while index >= chunk.end() {
      chunk = chunk.next.load_full()?;
    }
    chunk.slots[index - chunk.base].get().and_then(Entry::value).cloned()
  }

  pub(crate) fn cursor(&self) -> ChunkCursor<T, E> { ChunkCursor { chunk: self.head.clone(), offset: 0 } }
}

/// Reader position inside a [`ChunkedStore`].
pub(crate) struct ChunkCursor<T, E> {
  chunk: Arc<Chunk<T, E>>,
  offset: usize,
}

impl<T, E> ChunkCursor<T, E> {
  pub(crate) fn peek(&mut self) -> Option<&Entry<T, E>> {
    if self.offset == self.chunk.capacity() {
      let next = self.chunk.next.load_full()?;
      self.chunk = next;
      self.offset = 0;
    }
    self.chunk.slots[self.offset].get()
  }

  /// Only valid after `peek` returned an entry.
  #[inline]
  pub(crate) fn advance(&mut self) { self.offset += 1; }

  /// Absolute index of the next entry.
  #[inline]
  pub(crate) fn index(&self) -> usize { self.chunk.base + self.offset }
}
