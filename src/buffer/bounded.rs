use std::sync::Arc;

use once_cell::race::OnceBox;
use tracing::trace;

use super::Accumulator;
use crate::{
  clock::Clock,
  entry::{Entry, Outcome},
  eviction::EvictionPolicy,
  store::{LinkedCursor, LinkedStore, Node},
};

/// Linked-node buffer whose history is bounded by an [`EvictionPolicy`].
///
/// Subscribing while active skips the entries the policy considers stale
/// even if they are still linked; once terminated, everything retained at
/// termination is replayed regardless of age.
pub(crate) struct BoundedBuffer<T, E, P> {
  store: LinkedStore<T, E>,
  policy: P,
  clock: Arc<dyn Clock>,
  accumulator: Option<Accumulator<T>>,
  outcome: OnceBox<Outcome<E>>,
}

impl<T, E, P> BoundedBuffer<T, E, P>
where
  T: Clone,
  E: Clone,
  P: EvictionPolicy,
{
  pub(crate) fn new(policy: P, clock: Arc<dyn Clock>) -> Self {
    Self { store: LinkedStore::new(clock.now()), policy, clock, accumulator: None, outcome: OnceBox::new() }
  }

  pub(crate) fn with_accumulator(mut self, accumulator: Option<Accumulator<T>>) -> Self {
    self.accumulator = accumulator;
    self
  }

  pub(crate) fn append(&self, value: T) -> bool {
    if self.outcome.get().is_some() {
      return false;
    }
    let now = self.clock.now();
    let folded = self.accumulator.as_ref().map(|acc| acc.accumulate(self.store.tail().folded(), &value));
    self.store.append(Entry::Value(value), now, folded);
    let evicted = self.policy.evict(&self.store, now);
    if evicted > 0 {
      trace!(evicted, retained = self.store.len(), "evicted replay entries");
    }
    true
  }

  pub(crate) fn terminate(&self, outcome: Outcome<E>) -> bool {
    if self.outcome.set(Box::new(outcome.clone())).is_err() {
      return false;
    }
    let now = self.clock.now();
    self.store.append(Entry::Terminal(outcome), now, None);
    let evicted = self.policy.evict_final(&self.store, now);
    trace!(evicted, retained = self.store.len(), "final eviction");
    true
  }

  #[inline]
  pub(crate) fn outcome(&self) -> Option<&Outcome<E>> { self.outcome.get() }

  /// The node a subscriber starting now replays after.
  fn start(&self) -> Arc<Node<T, E>> {
    let mut node = self.store.head();
    if self.outcome.get().is_some() {
      return node;
    }
    let now = self.clock.now();
    while let Some(next) = node.next() {
      if !self.policy.test(&next, now) {
        break;
      }
      node = next;
    }
    node
  }

  /// A node's replayable value: the fold if one was recorded.
  fn replayed(node: &Node<T, E>) -> Option<&T> { node.folded().or_else(|| node.value()) }

  pub(crate) fn size(&self) -> usize { self.store.values_after(&self.start()) }

  pub(crate) fn snapshot(&self) -> Vec<T> {
    LinkedStore::iter_after(self.start())
      .filter_map(|node| Self::replayed(&node).cloned())
      .collect()
  }

  pub(crate) fn latest(&self) -> Option<T> {
    LinkedStore::iter_after(self.start())
      .filter(|node| node.is_value())
      .last()
      .and_then(|node| Self::replayed(&node).cloned())
  }

  pub(crate) fn cursor(&self) -> LinkedCursor<T, E> { self.store.cursor_at(self.start()) }
}
