use std::sync::{
  atomic::{AtomicU64, Ordering},
  Arc,
};

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::{clock::Instant, entry::Entry};

/// A node of the [`LinkedStore`].
///
/// `seq` is the node's position in append order (the initial sentinel is 0),
/// which turns "how many entries are between two nodes" into a subtraction.
pub(crate) struct Node<T, E> {
  seq: AtomicU64,
  entry: Option<Entry<T, E>>,
  stamp: Instant,
  folded: Option<T>,
  next: ArcSwapOption<Node<T, E>>,
}

impl<T, E> Node<T, E> {
  fn sentinel(stamp: Instant) -> Self {
    Self { seq: AtomicU64::new(0), entry: None, stamp, folded: None, next: ArcSwapOption::empty() }
  }

  #[inline]
  pub(crate) fn seq(&self) -> u64 { self.seq.load(Ordering::Relaxed) }

  /// The stored entry; `None` only for the store's initial sentinel.
  #[inline]
  pub(crate) fn entry(&self) -> Option<&Entry<T, E>> { self.entry.as_ref() }

  #[inline]
  pub(crate) fn stamp(&self) -> Instant { self.stamp }

  /// The accumulated snapshot recorded when this node was appended.
  #[inline]
  pub(crate) fn folded(&self) -> Option<&T> { self.folded.as_ref() }

  #[inline]
  pub(crate) fn value(&self) -> Option<&T> { self.entry().and_then(Entry::value) }

  #[inline]
  pub(crate) fn is_value(&self) -> bool { self.value().is_some() }

  #[inline]
  pub(crate) fn is_terminal(&self) -> bool { self.entry().is_some_and(Entry::is_terminal) }

  #[inline]
  pub(crate) fn next(&self) -> Option<Arc<Self>> { self.next.load_full() }
}

// Dropping a long chain recursively would overflow the stack, so unlink
// nodes one at a time for as long as we are the last owner.
impl<T, E> Drop for Node<T, E> {
  fn drop(&mut self) {
    let mut next = self.next.swap(None);
    while let Some(node) = next {
      match Arc::try_unwrap(node) {
        Ok(node) => next = node.next.swap(None),
        Err(_) => break,
      }
    }
  }
}

/// Singly linked append-only store with a detachable head.
///
/// `head` is the node *before* the first retained entry, so it can be moved
/// forward one node at a time without touching the nodes themselves.
/// Appends are lock-free: the new node is linked with a compare-and-swap on
/// the tail's `next`, and the tail pointer is helped forward by whichever
/// writer notices it lagging.
pub(crate) struct LinkedStore<T, E> {
  head: ArcSwap<Node<T, E>>,
  tail: ArcSwap<Node<T, E>>,
}

impl<T, E> LinkedStore<T, E> {
  pub(crate) fn new(now: Instant) -> Self {
    let sentinel = Arc::new(Node::sentinel(now));
    Self { head: ArcSwap::new(sentinel.clone()), tail: ArcSwap::new(sentinel) }
  }

  #[inline]
  pub(crate) fn head(&self) -> Arc<Node<T, E>> { self.head.load_full() }

  #[inline]
  pub(crate) fn tail(&self) -> Arc<Node<T, E>> { self.tail.load_full() }

  /// Links a new node after the current tail and returns it.
  pub(crate) fn append(&self, entry: Entry<T, E>, stamp: Instant, folded: Option<T>) -> Arc<Node<T, E>> {
    let node = Arc::new(Node {
      seq: AtomicU64::new(0),
      entry: Some(entry),
      stamp,
      folded,
      next: ArcSwapOption::empty(),
    });
    loop {
      let tail = self.tail.load_full();
      if let Some(next) = tail.next() {
        let _ = self.tail.compare_and_swap(&tail, next);
        continue;
      }
      // Not yet reachable by anyone else, the link below publishes it.
      node.seq.store(tail.seq() + 1, Ordering::Relaxed);
      let prev = tail.next.compare_and_swap(&None::<Arc<Node<T, E>>>, Some(node.clone()));
      if prev.is_none() {
        let _ = self.tail.compare_and_swap(&tail, node.clone());
        return node;
      }
    }
  }

  /// Moves the head from `current` to `new`, failing if another thread
  /// moved it first.
  pub(crate) fn replace_head(&self, current: &Arc<Node<T, E>>, new: Arc<Node<T, E>>) -> bool {
    let prev = self.head.compare_and_swap(current, new);
    Arc::ptr_eq(&*prev, current)
  }

  /// Number of value entries between `from` (exclusive) and the tail.
  pub(crate) fn values_after(&self, from: &Node<T, E>) -> usize {
    let tail = self.tail();
    let span = tail.seq().saturating_sub(from.seq());
    let span = if tail.is_terminal() { span.saturating_sub(1) } else { span };
    usize::try_from(span).unwrap_or(usize::MAX)
  }

  /// Number of value entries currently retained.
  #[inline]
  pub(crate) fn len(&self) -> usize { self.values_after(&self.head()) }

  /// Walks the nodes that follow `from`, in append order.
  pub(crate) fn iter_after(from: Arc<Node<T, E>>) -> NodeIter<T, E> { NodeIter { node: from.next() } }

  pub(crate) fn cursor_at(&self, node: Arc<Node<T, E>>) -> LinkedCursor<T, E> {
    LinkedCursor { node, pending: None }
  }
}

pub(crate) struct NodeIter<T, E> {
  node: Option<Arc<Node<T, E>>>,
}

impl<T, E> Iterator for NodeIter<T, E> {
  type Item = Arc<Node<T, E>>;

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.node.take()?;
    self.node = node.next();
    Some(node)
  }
}

/// Reader position: the last node consumed, plus the successor loaded by
/// the latest `peek`.
pub(crate) struct LinkedCursor<T, E> {
  node: Arc<Node<T, E>>,
  pending: Option<Arc<Node<T, E>>>,
}

impl<T, E> LinkedCursor<T, E> {
  pub(crate) fn peek(&mut self) -> Option<&Node<T, E>> {
    if self.pending.is_none() {
      self.pending = self.node.next();
    }
    self.pending.as_deref()
  }

  pub(crate) fn advance(&mut self) {
    if let Some(next) = self.pending.take() {
      self.node = next;
    }
  }

  #[inline]
  pub(crate) fn position(&self) -> u64 { self.node.seq() }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use super::*;
  use crate::entry::Outcome;

  fn values(store: &LinkedStore<u32, ()>) -> Vec<u32> {
    LinkedStore::iter_after(store.head()).filter_map(|n| n.value().copied()).collect()
  }

  #[rxreplay_macro::test]
  fn append_links_in_order() {
    let now = Instant::now();
    let store = LinkedStore::<u32, ()>::new(now);
    for i in 0..5 {
      let node = store.append(Entry::Value(i), now, None);
      assert_eq!(node.seq(), u64::from(i) + 1);
    }
    assert_eq!(values(&store), vec![0, 1, 2, 3, 4]);
    assert_eq!(store.len(), 5);

    store.append(Entry::Terminal(Outcome::Completed), now, None);
    assert_eq!(store.len(), 5);
    assert!(store.tail().is_terminal());
  }

  #[rxreplay_macro::test]
  fn detached_head_keeps_old_readers_walking() {
    let now = Instant::now();
    let store = LinkedStore::<u32, ()>::new(now);
    let mut reader = store.cursor_at(store.head());
    for i in 0..3 {
      store.append(Entry::Value(i), now, None);
    }

    let head = store.head();
    let first = head.next().unwrap();
    assert!(store.replace_head(&head, first.clone()));
    assert!(!store.replace_head(&head, first));
    assert_eq!(values(&store), vec![1, 2]);
    assert_eq!(store.len(), 2);

    let mut seen = vec![];
    while let Some(node) = reader.peek() {
      seen.push(*node.value().unwrap());
      reader.advance();
    }
    assert_eq!(seen, vec![0, 1, 2]);
  }

  #[rxreplay_macro::test]
  fn concurrent_appends_are_all_linked() {
    let store = Arc::new(LinkedStore::<u32, ()>::new(Instant::now()));
    let writers: Vec<_> = (0..4)
      .map(|w| {
        let store = store.clone();
        thread::spawn(move || {
          for i in 0..250 {
            store.append(Entry::Value(w * 1000 + i), Instant::now(), None);
          }
        })
      })
      .collect();
    for w in writers {
      w.join().unwrap();
    }

    let seqs: Vec<u64> = LinkedStore::iter_after(store.head()).map(|n| n.seq()).collect();
    assert_eq!(seqs, (1..=1000).collect::<Vec<_>>());
    let mut all = values(&store);
    all.sort_unstable();
    let mut expected: Vec<u32> = (0..4).flat_map(|w| (0..250).map(move |i| w * 1000 + i)).collect();
    expected.sort_unstable();
    assert_eq!(all, expected);
  }

  #[rxreplay_macro::test]
  fn dropping_a_long_chain_does_not_recurse() {
    let now = Instant::now();
    let store = LinkedStore::<u32, ()>::new(now);
    for i in 0..200_000 {
      store.append(Entry::Value(i), now, None);
    }
    drop(store);
  }
}
