//! Observer trait and implementations
//!
//! The Observer trait defines the consumer side of a subject. It provides
//! three methods: next (for values), error (for the failure terminal), and
//! complete (for the completion terminal).

// ============================================================================
// Observer Trait
// ============================================================================

/// Observer trait: the consumer of a subject's values.
///
/// Callbacks run on whichever thread triggered the drain that delivers them,
/// one at a time per subscriber. Keep them short.
pub trait Observer<Item, Err> {
  /// Receive the next value.
  fn next(&mut self, value: Item);

  /// Handle the failure terminal.
  ///
  /// This consumes the observer, as no more values can be emitted after an
  /// error
  fn error(self, err: Err);

  /// Handle the completion terminal.
  ///
  /// This consumes the observer, as no more values can be emitted after
  /// completion
  fn complete(self);

  /// Returns `true` if the observer will not accept more values.
  ///
  /// A closed observer is detached from its subject at the next drain.
  fn is_closed(&self) -> bool;
}

// ============================================================================
// DynObserver Trait - Object-safe Observer
// ============================================================================

/// Helper trait to enable object-safe Observers (Box<dyn Observer>)
///
/// Standard Observer trait is not object-safe because methods take `self` by
/// value. DynObserver mirrors the interface but adapts it for vtables.
pub trait DynObserver<Item, Err> {
  fn box_next(&mut self, value: Item);
  fn box_error(self: Box<Self>, err: Err);
  fn box_complete(self: Box<Self>);
  fn box_is_closed(&self) -> bool;
}

impl<T, Item, Err> DynObserver<Item, Err> for T
where
  T: Observer<Item, Err>,
{
  fn box_next(&mut self, value: Item) { self.next(value); }
  fn box_error(self: Box<Self>, err: Err) { self.error(err); }
  fn box_complete(self: Box<Self>) { self.complete(); }
  fn box_is_closed(&self) -> bool { self.is_closed() }
}

/// Boxed observer with Send bound, as stored by every subscriber.
pub type BoxedObserver<'a, Item, Err> = Box<dyn DynObserver<Item, Err> + Send + 'a>;

impl<'a, Item, Err> Observer<Item, Err> for BoxedObserver<'a, Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) { (**self).box_next(value) }

  #[inline]
  fn error(self, err: Err) { self.box_error(err) }

  #[inline]
  fn complete(self) { self.box_complete() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).box_is_closed() }
}

// ============================================================================
// FnMutObserver - Closure adapter
// ============================================================================

/// Closure adapter for the value channel only.
///
/// This enables ergonomic subscription syntax: `subject.subscribe_fn(|v|
/// println!("{}", v))`. The closure becomes the `next` handler, while `error`
/// and `complete` are ignored.
#[derive(Clone)]
pub struct FnMutObserver<F>(pub F);

impl<F, Item, Err> Observer<Item, Err> for FnMutObserver<F>
where
  F: FnMut(Item),
{
  #[inline]
  fn next(&mut self, v: Item) { (self.0)(v); }

  #[inline]
  fn error(self, _err: Err) {}

  #[inline]
  fn complete(self) {}

  #[inline]
  fn is_closed(&self) -> bool { false }
}

// ============================================================================
// ObserverFn - full callback set
// ============================================================================

/// An observer built from one closure per channel. See [`observer_fn`].
#[derive(Clone)]
pub struct ObserverFn<N, E, C> {
  pub next: N,
  pub error: E,
  pub complete: C,
}

/// Builds an observer from `on_value`, `on_error` and `on_complete` closures.
///
/// ```rust
/// use rxreplay::prelude::*;
///
/// let subject = ReplaySubject::<i32, String>::unbounded();
/// subject.next(1).unwrap();
/// subject.subscribe(observer_fn(
///   |v: i32| println!("value {v}"),
///   |e: String| eprintln!("failed: {e}"),
///   || println!("done"),
/// ));
/// ```
pub fn observer_fn<Item, Err, N, E, C>(next: N, error: E, complete: C) -> ObserverFn<N, E, C>
where
  N: FnMut(Item),
  E: FnOnce(Err),
  C: FnOnce(),
{
  ObserverFn { next, error, complete }
}

impl<Item, Err, N, E, C> Observer<Item, Err> for ObserverFn<N, E, C>
where
  N: FnMut(Item),
  E: FnOnce(Err),
  C: FnOnce(),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.next)(value) }

  #[inline]
  fn error(self, err: Err) { (self.error)(err) }

  #[inline]
  fn complete(self) { (self.complete)() }

  #[inline]
  fn is_closed(&self) -> bool { false }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;

  struct TestObserver {
    values: Vec<i32>,
  }

  impl Observer<i32, ()> for TestObserver {
    fn next(&mut self, value: i32) { self.values.push(value); }

    fn error(self, _: ()) {}

    fn complete(self) {}

    fn is_closed(&self) -> bool { false }
  }

  #[rxreplay_macro::test]
  fn test_observer_trait() {
    let mut obs = TestObserver { values: vec![] };
    obs.next(1);
    obs.next(2);
    assert_eq!(obs.values, vec![1, 2]);
    assert!(!obs.is_closed());
  }

  #[rxreplay_macro::test]
  fn test_closure_as_observer() {
    let mut count = 0;
    let mut closure_obs = FnMutObserver(|v: i32| {
      count += v;
    });

    Observer::<i32, ()>::next(&mut closure_obs, 10);
    Observer::<i32, ()>::next(&mut closure_obs, 20);
    assert_eq!(count, 30);
  }

  #[rxreplay_macro::test]
  fn boxed_observer_fn_reaches_every_channel() {
    let log = Arc::new(Mutex::new(vec![]));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    let mut boxed: BoxedObserver<'static, i32, &str> = Box::new(observer_fn(
      move |v: i32| l1.lock().unwrap().push(format!("next {v}")),
      move |e: &str| l2.lock().unwrap().push(format!("error {e}")),
      move || l3.lock().unwrap().push("complete".to_owned()),
    ));
    boxed.next(1);
    assert!(!boxed.is_closed());
    boxed.error("boom");
    assert_eq!(*log.lock().unwrap(), vec!["next 1", "error boom"]);
  }
}
