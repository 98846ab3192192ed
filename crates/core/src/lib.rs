//! Pure domain logic for the course access/completion/notification core.
//!
//! This crate has zero internal dependencies so it can be used by the
//! storage layer, the engine, and any future worker or CLI tooling:
//!
//! - [`expiry`] — raw expiry descriptors and fail-closed resolution.
//! - [`grant`] — the per-(course,user) access grant data model.
//! - [`progress`] — completion percentage math.
//! - [`event`] — lifecycle event envelope and typed event kinds.
//! - [`audit`] — student log type allow-list.
//! - [`trigger`] — email trigger rules and send-time computation.
//! - [`clock`] — time/timezone provider seam.

pub mod audit;
pub mod clock;
pub mod error;
pub mod event;
pub mod expiry;
pub mod grant;
pub mod progress;
pub mod provider;
pub mod trigger;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::CoreError;
pub use event::{LifecycleEvent, LifecycleEventKind};
pub use expiry::{ExpirySummary, SubscriptionStatus, SubscriptionStatusProvider};
pub use grant::{AccessGrant, ExpiryDescriptor, LastVisit};
pub use provider::CourseStructureProvider;
pub use trigger::{EmailRule, TriggerCondition};
pub use types::{ChapterId, CourseId, DbId, GrantKey, RequestContext, Timestamp, UserId};
