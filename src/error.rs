//! Errors reported by a [`ReplaySubject`](crate::subject::ReplaySubject).

use std::any::Any;

use smallvec::SmallVec;
use thiserror::Error;

/// Error returned by the publishing and demand methods of a subject.
#[derive(Debug, Error)]
pub enum SubjectError {
  /// A value was published after the subject terminated; it was dropped.
  #[error("subject already terminated")]
  Terminated,
  /// A subscription handle was used after it was unsubscribed.
  #[error("subscription already unsubscribed")]
  Unsubscribed,
  #[error("invalid configuration: {0}")]
  InvalidConfig(&'static str),
  /// One or more subscriber callbacks panicked while being drained.
  #[error(transparent)]
  Delivery(#[from] DeliveryError),
}

/// A subscriber whose callback panicked during delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subscriber {subscriber}: {message}")]
pub struct DeliveryFailure {
  pub subscriber: u64,
  pub message: String,
}

impl DeliveryFailure {
  pub(crate) fn from_panic(subscriber: u64, payload: Box<dyn Any + Send>) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "callback panicked".to_owned()
    };
    Self { subscriber, message }
  }
}

/// Every callback failure collected during one fan-out.
#[derive(Debug, Default, Clone, PartialEq, Eq, Error)]
#[error("{} subscriber callback(s) panicked{}", .failures.len(), summary(.failures))]
pub struct DeliveryError {
  failures: SmallVec<[DeliveryFailure; 2]>,
}

impl DeliveryError {
  #[inline]
  pub fn failures(&self) -> &[DeliveryFailure] { &self.failures }

  #[inline]
  pub fn is_empty(&self) -> bool { self.failures.is_empty() }

  pub(crate) fn push(&mut self, failure: DeliveryFailure) { self.failures.push(failure); }

  /// `Ok` when nothing failed.
  pub(crate) fn into_result(self) -> Result<(), SubjectError> {
    if self.is_empty() { Ok(()) } else { Err(SubjectError::Delivery(self)) }
  }
}

impl From<DeliveryFailure> for DeliveryError {
  fn from(failure: DeliveryFailure) -> Self {
    let mut err = Self::default();
    err.push(failure);
    err
  }
}

fn summary(failures: &[DeliveryFailure]) -> String {
  failures.iter().map(|failure| format!("; {failure}")).collect()
}
