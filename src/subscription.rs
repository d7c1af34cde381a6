//! Subscription handles.

/// Handle returned from a subscribe call that allows detaching the
/// subscriber before it has received its terminal event.
pub trait Subscription {
  /// Detaches the subscriber. Values published afterwards are not delivered
  /// to it; a drain already in flight may still finish.
  fn unsubscribe(self);

  /// `true` once the subscriber was detached or has received its terminal.
  fn is_closed(&self) -> bool;

  /// Activates "RAII" behavior for this subscription. That means
  /// `unsubscribe()` will be called automatically as soon as the returned
  /// value goes out of scope.
  ///
  /// **Attention:** If you don't assign the return value to a variable,
  /// `unsubscribe()` is called immediately, which is probably not what you
  /// want!
  fn unsubscribe_when_dropped(self) -> SubscriptionGuard<Self>
  where
    Self: Sized,
  {
    SubscriptionGuard::new(self)
  }
}

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be unsubscribed.
///
/// If you want to drop it immediately, wrap it in its own scope
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard<S: Subscription>(Option<S>);

impl<S: Subscription> SubscriptionGuard<S> {
  /// Wraps an existing subscription with a guard to enable RAII behavior for
  /// it.
  pub fn new(subscription: S) -> Self { SubscriptionGuard(Some(subscription)) }

  /// Gives the subscription back without unsubscribing it.
  pub fn into_inner(mut self) -> Option<S> { self.0.take() }

  pub fn get(&self) -> Option<&S> { self.0.as_ref() }
}

impl<S: Subscription> Drop for SubscriptionGuard<S> {
  #[inline]
  fn drop(&mut self) {
    if let Some(subscription) = self.0.take() {
      subscription.unsubscribe();
    }
  }
}
