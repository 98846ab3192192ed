//! Lifecycle event fan-out.
//!
//! [`LifecycleEventBus`] delivers [`coursekit_core::LifecycleEvent`]s to
//! typed subscribers, synchronously, in registration order, inside the
//! publishing call. There is no persistence, no replay, and no
//! deduplication; consumers needing idempotence implement it themselves.

pub mod bus;

pub use bus::{DispatchReport, LifecycleEventBus, LifecycleSubscriber, SubscriberError};
