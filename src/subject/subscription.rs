use std::{fmt, sync::Arc};

use tracing::debug;

use super::{Subscriber, SubjectCore};
use crate::{
  error::{DeliveryFailure, SubjectError},
  subscription::Subscription,
};

/// Handle to one subscriber of a [`ReplaySubject`](super::ReplaySubject).
///
/// Clones refer to the same subscriber. Once any clone unsubscribes, the
/// others report [`SubjectError::Unsubscribed`] from [`request`]. A
/// subscriber cancelled by a panicking callback reports that panic instead.
///
/// [`request`]: ReplaySubscription::request
pub struct ReplaySubscription<T, E> {
  subscriber: Arc<Subscriber<T, E>>,
  core: Arc<SubjectCore<T, E>>,
}

impl<T, E> Clone for ReplaySubscription<T, E> {
  fn clone(&self) -> Self { Self { subscriber: self.subscriber.clone(), core: self.core.clone() } }
}

impl<T, E> fmt::Debug for ReplaySubscription<T, E>
where
  T: Clone,
  E: Clone,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ReplaySubscription")
      .field("id", &self.subscriber.id())
      .field("requested", &self.subscriber.requested())
      .field("is_closed", &self.subscriber.is_done())
      .finish()
  }
}

impl<T, E> ReplaySubscription<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  pub(crate) fn new(subscriber: Arc<Subscriber<T, E>>, core: Arc<SubjectCore<T, E>>) -> Self {
    Self { subscriber, core }
  }

  /// Grants `n` more values and delivers what is pending.
  ///
  /// Demand saturates at unbounded; `request(0)` does nothing. A panic in
  /// this subscriber's callback, now or earlier, is returned as
  /// [`SubjectError::Delivery`].
  pub fn request(&self, n: u64) -> Result<(), SubjectError> {
    if self.subscriber.is_cancelled() {
      return Err(match self.subscriber.failure() {
        Some(failure) => SubjectError::Delivery(failure.clone().into()),
        None => SubjectError::Unsubscribed,
      });
    }
    if n == 0 {
      return Ok(());
    }
    self.subscriber.add_demand(n);
    let drained = self.core.buffer.drain(&self.subscriber);
    self.core.detach_if_done(&self.subscriber);
    drained.map_err(|failure| SubjectError::Delivery(failure.into()))
  }

  /// Outstanding demand; `u64::MAX` means unbounded.
  #[inline]
  pub fn requested(&self) -> u64 { self.subscriber.requested() }

  /// Whether this subscriber has replayed everything that was retained
  /// when it last looked.
  #[inline]
  pub fn is_caught_up(&self) -> bool { self.subscriber.is_caught_up() }

  #[inline]
  pub fn id(&self) -> u64 { self.subscriber.id() }

  /// The callback panic that cancelled this subscriber, including one
  /// raised while replaying history inside `subscribe`.
  pub fn failure(&self) -> Option<DeliveryFailure> { self.subscriber.failure().cloned() }
}

impl<T, E> Subscription for ReplaySubscription<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  fn unsubscribe(self) {
    if !self.subscriber.cancel() {
      return;
    }
    self.core.registry.remove(&self.subscriber);
    debug!(subscriber = self.subscriber.id(), "unsubscribed");
    // releases the observer, unless a drain in flight does it first
    let _ = self.core.buffer.drain(&self.subscriber);
  }

  #[inline]
  fn is_closed(&self) -> bool { self.subscriber.is_done() }
}
