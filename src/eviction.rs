//! Eviction policies bounding how much history a linked buffer retains.
//!
//! A policy runs synchronously after every append, before the new entry is
//! fanned out, so every store state a reader can observe already satisfies
//! the bound. Policies only ever detach value entries from the head: the
//! terminal entry is never evicted.
//!
//! `test` is the per-entry staleness predicate. Subscribers use it to skip
//! stale leading entries that are still linked because physical eviction
//! only happens when something is appended.

use crate::{
  clock::{is_expired, Duration, Instant},
  store::{LinkedStore, Node},
};

pub(crate) trait EvictionPolicy: Send + Sync {
  /// Detaches head entries over the bound; returns how many were dropped.
  fn evict<T, E>(&self, store: &LinkedStore<T, E>, now: Instant) -> usize;

  /// Eviction run once when the terminal entry has been appended.
  fn evict_final<T, E>(&self, store: &LinkedStore<T, E>, now: Instant) -> usize {
    self.evict(store, now)
  }

  /// Whether `node` may be skipped by a reader starting now.
  fn test<T, E>(&self, node: &Node<T, E>, now: Instant) -> bool;
}

/// Pops value entries off the head while `over` says the first retained one
/// should go. `over` gets the current head and the first retained node.
fn pop_while<T, E>(store: &LinkedStore<T, E>, over: impl Fn(&Node<T, E>, &Node<T, E>) -> bool) -> usize {
  let mut evicted = 0;
  loop {
    let head = store.head();
    let Some(first) = head.next() else { break };
    if !first.is_value() || !over(&head, &first) {
      break;
    }
    if store.replace_head(&head, first) {
      evicted += 1;
    }
  }
  evicted
}

/// Never evicts.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct KeepAll;

impl EvictionPolicy for KeepAll {
  #[inline]
  fn evict<T, E>(&self, _: &LinkedStore<T, E>, _: Instant) -> usize { 0 }

  #[inline]
  fn test<T, E>(&self, _: &Node<T, E>, _: Instant) -> bool { false }
}

/// Retains at most `limit` values.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SizeBound {
  limit: usize,
}

impl SizeBound {
  pub(crate) fn new(limit: usize) -> Self { Self { limit } }
}

impl EvictionPolicy for SizeBound {
  fn evict<T, E>(&self, store: &LinkedStore<T, E>, _: Instant) -> usize {
    pop_while(store, |head, _| store.values_after(head) > self.limit)
  }

  // Size is a property of the whole buffer, not of a single entry.
  #[inline]
  fn test<T, E>(&self, _: &Node<T, E>, _: Instant) -> bool { false }
}

/// Retains values younger than `max_age`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TimeBound {
  max_age: Duration,
}

impl TimeBound {
  pub(crate) fn new(max_age: Duration) -> Self { Self { max_age } }
}

impl EvictionPolicy for TimeBound {
  fn evict<T, E>(&self, store: &LinkedStore<T, E>, now: Instant) -> usize {
    pop_while(store, |_, first| self.test(first, now))
  }

  #[inline]
  fn test<T, E>(&self, node: &Node<T, E>, now: Instant) -> bool {
    node.is_value() && is_expired(node.stamp(), self.max_age, now)
  }
}

/// Applies `A` then `B`; an entry is stale if either says so.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Paired<A, B>(pub(crate) A, pub(crate) B);

impl<A: EvictionPolicy, B: EvictionPolicy> EvictionPolicy for Paired<A, B> {
  fn evict<T, E>(&self, store: &LinkedStore<T, E>, now: Instant) -> usize {
    self.0.evict(store, now) + self.1.evict(store, now)
  }

  fn evict_final<T, E>(&self, store: &LinkedStore<T, E>, now: Instant) -> usize {
    self.0.evict_final(store, now) + self.1.evict_final(store, now)
  }

  fn test<T, E>(&self, node: &Node<T, E>, now: Instant) -> bool {
    self.0.test(node, now) || self.1.test(node, now)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    clock::{Clock, ManualClock},
    entry::{Entry, Outcome},
  };

  fn retained(store: &LinkedStore<u32, ()>) -> Vec<u32> {
    LinkedStore::iter_after(store.head()).filter_map(|n| n.value().copied()).collect()
  }

  #[rxreplay_macro::test]
  fn size_bound_keeps_the_most_recent() {
    let now = Instant::now();
    let store = LinkedStore::new(now);
    let policy = SizeBound::new(2);
    let mut evicted = 0;
    for i in 0..5 {
      store.append(Entry::Value(i), now, None);
      evicted += policy.evict(&store, now);
    }
    assert_eq!(evicted, 3);
    assert_eq!(retained(&store), vec![3, 4]);

    store.append(Entry::Terminal(Outcome::Completed), now, None);
    assert_eq!(policy.evict_final(&store, now), 0);
    assert_eq!(retained(&store), vec![3, 4]);
    assert!(store.tail().is_terminal());
  }

  #[rxreplay_macro::test]
  fn size_zero_never_drops_the_terminal() {
    let now = Instant::now();
    let store = LinkedStore::<u32, ()>::new(now);
    let policy = SizeBound::new(0);
    store.append(Entry::Value(1), now, None);
    policy.evict(&store, now);
    store.append(Entry::Terminal(Outcome::Completed), now, None);
    policy.evict_final(&store, now);
    assert_eq!(store.len(), 0);
    assert!(store.head().next().is_some_and(|n| n.is_terminal()));
  }

  #[rxreplay_macro::test]
  fn time_bound_drops_expired_heads() {
    let clock = ManualClock::new();
    let store = LinkedStore::new(clock.now());
    let policy = TimeBound::new(Duration::from_millis(10));

    store.append(Entry::Value(1), clock.now(), None);
    clock.advance(Duration::from_millis(6));
    store.append(Entry::Value(2), clock.now(), None);
    assert_eq!(policy.evict(&store, clock.now()), 0);

    clock.advance(Duration::from_millis(4));
    let first = store.head().next().unwrap();
    assert!(policy.test(&first, clock.now()));
    assert_eq!(policy.evict(&store, clock.now()), 1);
    assert_eq!(retained(&store), vec![2]);

    clock.advance(Duration::from_secs(1));
    store.append(Entry::Terminal(Outcome::Completed), clock.now(), None);
    assert_eq!(policy.evict_final(&store, clock.now()), 1);
    assert_eq!(store.len(), 0);
    assert!(store.tail().is_terminal());
  }

  #[rxreplay_macro::test]
  fn paired_applies_both_bounds() {
    let clock = ManualClock::new();
    let store = LinkedStore::new(clock.now());
    let policy = Paired(SizeBound::new(3), TimeBound::new(Duration::from_millis(10)));
    for i in 0..5 {
      store.append(Entry::Value(i), clock.now(), None);
      policy.evict(&store, clock.now());
    }
    assert_eq!(retained(&store), vec![2, 3, 4]);

    clock.advance(Duration::from_millis(6));
    store.append(Entry::Value(5), clock.now(), None);
    policy.evict(&store, clock.now());
    assert_eq!(retained(&store), vec![3, 4, 5]);

    // size drops 3, then time drops 4 (both stamped at 0ms, now 10ms)
    clock.advance(Duration::from_millis(4));
    store.append(Entry::Value(6), clock.now(), None);
    assert_eq!(policy.evict(&store, clock.now()), 2);
    assert_eq!(retained(&store), vec![5, 6]);

    let first = store.head().next().unwrap();
    assert!(!policy.test(&first, clock.now()));
    clock.advance(Duration::from_millis(6));
    assert!(policy.test(&first, clock.now()));
    assert!(!KeepAll.test(&first, clock.now()));
  }
}
