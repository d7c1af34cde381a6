//! Async bridge: consuming a subject as a [`Stream`].
//!
//! ```rust
//! use futures::StreamExt;
//! use rxreplay::prelude::*;
//!
//! # async fn example() {
//! let subject = ReplaySubject::<i32, String>::unbounded();
//! subject.next(1).unwrap();
//! let mut stream = subject.clone().into_stream(8);
//!
//! if let Some(Ok(value)) = stream.next().await {
//!   println!("Received: {}", value);
//! }
//! # }
//! ```

use std::{
  collections::VecDeque,
  pin::Pin,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  task::{Context, Poll, Waker},
};

use futures::Stream;

use crate::{
  observer::Observer,
  subject::{ReplaySubject, ReplaySubscription},
  subscription::Subscription,
};

struct StreamState<T, E> {
  queue: VecDeque<Result<T, E>>,
  waker: Option<Waker>,
  is_closed: bool,
}

type SharedState<T, E> = Arc<Mutex<StreamState<T, E>>>;

fn lock<T, E>(state: &SharedState<T, E>) -> MutexGuard<'_, StreamState<T, E>> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`Stream`] of a subject's values, created by
/// [`ReplaySubject::into_stream`].
///
/// Yields `Ok(T)` per value, then `Err(E)` if the subject failed, then ends.
/// Demand follows consumption: the stream holds at most `prefetch` values
/// that were not yet polled. Dropping it unsubscribes.
pub struct ReplayStream<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  state: SharedState<T, E>,
  subscription: Option<ReplaySubscription<T, E>>,
}

impl<T, E> ReplaySubject<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  /// Subscribes a [`ReplayStream`] that prefetches up to `prefetch` values.
  /// A `prefetch` of zero is treated as one.
  pub fn into_stream(self, prefetch: usize) -> ReplayStream<T, E> {
    let state = Arc::new(Mutex::new(StreamState { queue: VecDeque::new(), waker: None, is_closed: false }));
    let observer = StreamObserver { state: state.clone() };
    let demand = prefetch.max(1) as u64;
    let subscription = self.subscribe_with_demand(observer, demand);
    ReplayStream { state, subscription: Some(subscription) }
  }
}

impl<T, E> Stream for ReplayStream<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  type Item = Result<T, E>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    let mut state = lock(&this.state);
    match state.queue.pop_front() {
      Some(item) => {
        // the refill may deliver synchronously into the queue
        drop(state);
        if item.is_ok() {
          if let Some(subscription) = &this.subscription {
            let _ = subscription.request(1);
          }
        }
        Poll::Ready(Some(item))
      }
      None if state.is_closed => Poll::Ready(None),
      None => {
        state.waker = Some(cx.waker().clone());
        Poll::Pending
      }
    }
  }
}

impl<T, E> Drop for ReplayStream<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  fn drop(&mut self) {
    if let Some(subscription) = self.subscription.take() {
      subscription.unsubscribe();
    }
  }
}

struct StreamObserver<T, E> {
  state: SharedState<T, E>,
}

impl<T, E> StreamObserver<T, E> {
  fn push(&self, item: Option<Result<T, E>>) {
    let mut state = lock(&self.state);
    match item {
      Some(item @ Ok(_)) => state.queue.push_back(item),
      Some(err) => {
        state.queue.push_back(err);
        state.is_closed = true;
      }
      None => state.is_closed = true,
    }
    if let Some(waker) = state.waker.take() {
      waker.wake();
    }
  }
}

impl<T, E> Observer<T, E> for StreamObserver<T, E> {
  fn next(&mut self, value: T) { self.push(Some(Ok(value))); }

  fn error(self, err: E) { self.push(Some(Err(err))); }

  fn complete(self) { self.push(None); }

  fn is_closed(&self) -> bool { lock(&self.state).is_closed }
}

#[cfg(test)]
mod tests {
  use std::{thread, time::Duration as StdDuration};

  use futures::StreamExt;

  use super::*;

  #[rxreplay_macro::test]
  async fn replays_then_follows_live_values() {
    let subject = ReplaySubject::<u32, String>::unbounded();
    subject.next(1).unwrap();
    subject.next(2).unwrap();
    let stream = subject.clone().into_stream(1);

    let publisher = subject.clone();
    let handle = thread::spawn(move || {
      for i in 3..=5 {
        thread::sleep(StdDuration::from_millis(1));
        publisher.next(i).unwrap();
      }
      publisher.complete().unwrap();
    });

    let values: Vec<_> = stream.collect().await;
    handle.join().unwrap();
    assert_eq!(values, vec![Ok(1), Ok(2), Ok(3), Ok(4), Ok(5)]);
  }

  #[rxreplay_macro::test]
  async fn demand_follows_consumption() {
    let subject = ReplaySubject::<u32, String>::unbounded();
    for i in 0..10 {
      subject.next(i).unwrap();
    }
    let mut stream = subject.clone().into_stream(3);
    assert_eq!(lock(&stream.state).queue.len(), 3);

    assert_eq!(stream.next().await, Some(Ok(0)));
    assert_eq!(lock(&stream.state).queue.len(), 3);

    subject.error("boom".to_owned()).unwrap();
    let rest: Vec<_> = stream.collect().await;
    assert_eq!(rest.len(), 10);
    assert_eq!(rest.last(), Some(&Err("boom".to_owned())));
  }

  #[rxreplay_macro::test]
  async fn dropping_the_stream_unsubscribes() {
    let subject = ReplaySubject::<u32, String>::size_bound(4);
    let stream = subject.clone().into_stream(0);
    assert_eq!(subject.subscriber_count(), 1);
    drop(stream);
    assert_eq!(subject.subscriber_count(), 0);
  }
}
