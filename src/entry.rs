//! Entries stored by the replay buffers.
//!
//! An [`Entry`] is either a value or the single terminal marker that ends a
//! subject's stream. Stores keep entries in append order and never mutate
//! one after it has been published.

/// How a subject's stream ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<E> {
  Completed,
  Failed(E),
}

impl<E> Outcome<E> {
  #[inline]
  pub fn is_failed(&self) -> bool { matches!(self, Outcome::Failed(_)) }

  /// The error carried by a failed outcome.
  pub fn error(&self) -> Option<&E> {
    match self {
      Outcome::Failed(err) => Some(err),
      Outcome::Completed => None,
    }
  }
}

/// One slot of the append-only store.
///
/// At most one `Terminal` entry exists per store and it is always the last
/// one appended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry<T, E> {
  Value(T),
  Terminal(Outcome<E>),
}

impl<T, E> Entry<T, E> {
  #[inline]
  pub fn is_terminal(&self) -> bool { matches!(self, Entry::Terminal(_)) }

  #[inline]
  pub fn value(&self) -> Option<&T> {
    match self {
      Entry::Value(v) => Some(v),
      Entry::Terminal(_) => None,
    }
  }

  #[inline]
  pub fn outcome(&self) -> Option<&Outcome<E>> {
    match self {
      Entry::Terminal(outcome) => Some(outcome),
      Entry::Value(_) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxreplay_macro::test]
  fn terminal_accessors() {
    let done: Entry<i32, &str> = Entry::Terminal(Outcome::Completed);
    assert!(done.is_terminal());
    assert_eq!(done.value(), None);
    assert_eq!(done.outcome().and_then(Outcome::error), None);

    let failed: Entry<i32, &str> = Entry::Terminal(Outcome::Failed("boom"));
    assert!(failed.outcome().is_some_and(Outcome::is_failed));
    assert_eq!(failed.outcome().and_then(Outcome::error), Some(&"boom"));

    let value: Entry<i32, &str> = Entry::Value(7);
    assert!(!value.is_terminal());
    assert_eq!(value.value(), Some(&7));
  }
}
