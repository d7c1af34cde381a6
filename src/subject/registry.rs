//! Copy-on-write subscriber registry.
//!
//! Readers load the current member list without blocking and iterate an
//! immutable snapshot. Writers build a new list from the one they loaded and
//! publish it with a compare-and-swap, retrying from the latest list when
//! another writer got there first. `Terminated` is a sink: once swapped in,
//! no membership change is ever accepted again.

use std::sync::Arc;

use arc_swap::ArcSwap;

pub(crate) enum Members<H> {
  Active(Vec<Arc<H>>),
  Terminated,
}

pub(crate) struct Registry<H> {
  members: ArcSwap<Members<H>>,
}

impl<H> Registry<H> {
  pub(crate) fn new() -> Self { Self { members: ArcSwap::from_pointee(Members::Active(Vec::new())) } }

  /// Adds `handle`; `false` if the registry is already terminated.
  pub(crate) fn add(&self, handle: Arc<H>) -> bool {
    let mut current = self.members.load_full();
    loop {
      let Members::Active(list) = &*current else { return false };
      let mut next = Vec::with_capacity(list.len() + 1);
      next.extend(list.iter().cloned());
      next.push(handle.clone());
      let prev = self.members.compare_and_swap(&current, Arc::new(Members::Active(next)));
      if Arc::ptr_eq(&*prev, &current) {
        return true;
      }
      current = arc_swap::Guard::into_inner(prev);
    }
  }

  /// Removes `handle` if it is still a member; returns whether it was.
  pub(crate) fn remove(&self, handle: &Arc<H>) -> bool {
    let mut current = self.members.load_full();
    loop {
      let Members::Active(list) = &*current else { return false };
      let Some(at) = list.iter().position(|h| Arc::ptr_eq(h, handle)) else { return false };
      let mut next = list.clone();
      next.remove(at);
      let prev = self.members.compare_and_swap(&current, Arc::new(Members::Active(next)));
      if Arc::ptr_eq(&*prev, &current) {
        return true;
      }
      current = arc_swap::Guard::into_inner(prev);
    }
  }

  /// The members at this instant, empty once terminated.
  pub(crate) fn snapshot(&self) -> Vec<Arc<H>> {
    match &**self.members.load() {
      Members::Active(list) => list.clone(),
      Members::Terminated => Vec::new(),
    }
  }

  pub(crate) fn len(&self) -> usize {
    match &**self.members.load() {
      Members::Active(list) => list.len(),
      Members::Terminated => 0,
    }
  }

  /// Freezes the registry and hands back the members that still have to
  /// receive the terminal. Only the first call gets a non-empty list.
  pub(crate) fn terminate(&self) -> Vec<Arc<H>> {
    match &*self.members.swap(Arc::new(Members::Terminated)) {
      Members::Active(list) => list.clone(),
      Members::Terminated => Vec::new(),
    }
  }
}
