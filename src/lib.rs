//! # rxreplay: replaying subjects with backpressure
//!
//! A [`ReplaySubject`] fans published values out to every attached
//! subscriber, replays retained history to subscribers that join late, and
//! never delivers more to a subscriber than it has requested.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxreplay::prelude::*;
//!
//! let subject = ReplaySubject::<u32, String>::size_bound(2);
//! subject.next(1).unwrap();
//! subject.next(2).unwrap();
//! subject.next(3).unwrap();
//!
//! // a late subscriber asking for one value at a time
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
//! let sink = seen.clone();
//! let sub = subject.subscribe_with_demand(FnMutObserver(move |v: u32| sink.lock().unwrap().push(v)), 1);
//! assert_eq!(*seen.lock().unwrap(), vec![2]);
//! sub.request(1).unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ReplaySubject`] | Publisher-facing sink and multi-subscriber source |
//! | [`ReplayMode`] | How much history is retained for late subscribers |
//! | [`Observer`] | Consumes `next`, `error`, and `complete` events |
//! | [`ReplaySubscription`] | Grants demand, or detaches the subscriber |
//! | [`ReplayStream`] | The subject consumed as a `futures` stream |
//!
//! ## Concurrency
//!
//! Publishing, subscribing, requesting and unsubscribing may all happen
//! from different threads at once. None of them takes a lock: the
//! subscriber registry is a copy-on-write list swapped atomically, buffers
//! are append-only, and each subscriber's deliveries are serialized by a
//! work-in-progress counter rather than a mutex. Callbacks run on whichever
//! thread triggered the delivery.
//!
//! Ordering is guaranteed per subscriber only, and assumes one logical
//! publisher.
//!
//! [`ReplaySubject`]: subject::ReplaySubject
//! [`ReplayMode`]: buffer::ReplayMode
//! [`Observer`]: observer::Observer
//! [`ReplaySubscription`]: subject::ReplaySubscription
//! [`ReplayStream`]: stream::ReplayStream

pub mod buffer;
pub mod clock;
pub mod entry;
pub mod error;
mod eviction;
pub mod observer;
pub mod prelude;
mod store;
pub mod stream;
pub mod subject;
pub mod subscription;

pub use prelude::*;
