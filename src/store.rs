//! Append-only entry storage shared between one publisher and many readers.
//!
//! Two representations are provided:
//!
//! | Store | Layout | Used by |
//! |-------|--------|---------|
//! | [`ChunkedStore`] | fixed-size chunks linked at the boundary | the unbounded buffer |
//! | [`LinkedStore`] | one node per entry, detachable head | the bounded buffers |
//!
//! # Publication
//!
//! A slot or node is written completely before it becomes reachable: chunk
//! slots are write-once cells and node links are atomically swapped
//! pointers, both published with release ordering and read with acquire
//! ordering. A reader that can see an entry therefore always sees all of it.
//!
//! # Lifetime
//!
//! Readers hold reference-counted cursors. Evicting entries only moves the
//! store's head forward; a reader still positioned before the new head keeps
//! its part of the chain alive and keeps walking it without gaps.

mod chunked;
mod linked;

pub(crate) use chunked::{ChunkCursor, ChunkedStore};
pub(crate) use linked::{LinkedCursor, LinkedStore, Node};

use crate::entry::Entry;

/// A reader position in one of the stores.
///
/// `peek` looks at the entry after the position without consuming it;
/// `advance` moves past the entry last returned by `peek`.
pub(crate) enum Cursor<T, E> {
  Chunked(ChunkCursor<T, E>),
  Linked(LinkedCursor<T, E>),
}

impl<T, E> Cursor<T, E> {
  /// The next entry, or `None` if the reader is at the current end.
  pub(crate) fn peek(&mut self) -> Option<&Entry<T, E>> {
    match self {
      Cursor::Chunked(c) => c.peek(),
      Cursor::Linked(c) => c.peek().and_then(Node::entry),
    }
  }

  pub(crate) fn advance(&mut self) {
    match self {
      Cursor::Chunked(c) => c.advance(),
      Cursor::Linked(c) => c.advance(),
    }
  }

  /// How many entries the reader has moved past, counted from the start of
  /// the store.
  pub(crate) fn position(&self) -> u64 {
    match self {
      Cursor::Chunked(c) => c.index() as u64,
      Cursor::Linked(c) => c.position(),
    }
  }

  /// Clones the next value and moves past it.
  ///
  /// With `folded` set, a linked node carrying an accumulated snapshot
  /// yields that instead of its own value.
  pub(crate) fn next_value(&mut self, folded: bool) -> Option<T>
  where
    T: Clone,
  {
    let value = match self {
      Cursor::Chunked(c) => c.peek().and_then(Entry::value).cloned(),
      Cursor::Linked(c) => c.peek().and_then(|node| {
        let snapshot = if folded { node.folded() } else { None };
        snapshot.or_else(|| node.entry().and_then(Entry::value)).cloned()
      }),
    };
    if value.is_some() {
      self.advance();
    }
    value
  }
}
