//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Replay modes
pub use crate::buffer::{Fold, ReplayMode, Seed};
// Time
pub use crate::clock::{Clock, Duration, Instant, ManualClock, SystemClock};
// Data model
pub use crate::entry::{Entry, Outcome};
// Errors
pub use crate::error::{DeliveryError, DeliveryFailure, SubjectError};
// Observer trait and adapters
pub use crate::observer::{observer_fn, BoxedObserver, DynObserver, FnMutObserver, Observer, ObserverFn};
// Async bridge
pub use crate::stream::ReplayStream;
// Subject
pub use crate::subject::{ReplayBuilder, ReplaySubject, ReplaySubscription, DEFAULT_CHUNK_SIZE};
// Subscription
pub use crate::subscription::{Subscription, SubscriptionGuard};
