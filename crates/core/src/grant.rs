//! Access grant data model.
//!
//! An [`AccessGrant`] records one learner's right to view one course and
//! how much of it they have completed. Grants are created by the external
//! purchase workflow and never deleted by this core; all mutation goes
//! through the engine's `AccessRecordStore`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{ChapterId, CourseId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// ExpiryDescriptor
// ---------------------------------------------------------------------------

/// How a grant expires.
///
/// Represented as a tagged union so every branch is exhaustively
/// checkable; the raw string form is parsed by [`crate::expiry::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpiryDescriptor {
    /// Expires at a fixed epoch second. `0` means unlimited (never expires).
    Fixed { epoch: i64 },

    /// Access follows an external subscription's status.
    SubscriptionLinked { subscription_id: String },
}

impl ExpiryDescriptor {
    /// Unlimited access.
    pub const fn unlimited() -> Self {
        Self::Fixed { epoch: 0 }
    }
}

// ---------------------------------------------------------------------------
// LastVisit
// ---------------------------------------------------------------------------

/// Pointer to the chapter the learner most recently opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastVisit {
    pub chapter_id: ChapterId,
    pub at: Timestamp,
}

// ---------------------------------------------------------------------------
// AccessGrant
// ---------------------------------------------------------------------------

/// Per-(course,user) access and completion record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub course_id: CourseId,
    pub user_id: UserId,

    /// Expiry model for this grant.
    pub expiry: ExpiryDescriptor,

    /// Leaf chapters the learner has marked finished. Changes only via
    /// the store's toggle operation.
    pub finished_chapter_ids: BTreeSet<ChapterId>,

    /// First time the learner opened each chapter. Written once per
    /// chapter; later visits leave the recorded time untouched.
    pub first_visit_times: BTreeMap<ChapterId, Timestamp>,

    /// Flips true exactly once, when the course completion milestone
    /// fires. Never reset by this core.
    pub already_completed: bool,

    /// Most recently opened chapter, if any.
    pub last_visit: Option<LastVisit>,
}

impl AccessGrant {
    /// A fresh grant with no recorded activity.
    pub fn new(
        course_id: impl Into<CourseId>,
        user_id: impl Into<UserId>,
        expiry: ExpiryDescriptor,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            user_id: user_id.into(),
            expiry,
            finished_chapter_ids: BTreeSet::new(),
            first_visit_times: BTreeMap::new(),
            already_completed: false,
            last_visit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grant_has_no_activity() {
        let grant = AccessGrant::new("c1", "u1", ExpiryDescriptor::unlimited());
        assert!(grant.finished_chapter_ids.is_empty());
        assert!(grant.first_visit_times.is_empty());
        assert!(!grant.already_completed);
        assert!(grant.last_visit.is_none());
    }

    #[test]
    fn expiry_descriptor_serializes_tagged() {
        let fixed = serde_json::to_value(ExpiryDescriptor::Fixed { epoch: 42 }).unwrap();
        assert_eq!(fixed["type"], "fixed");
        assert_eq!(fixed["epoch"], 42);

        let sub = serde_json::to_value(ExpiryDescriptor::SubscriptionLinked {
            subscription_id: "123".into(),
        })
        .unwrap();
        assert_eq!(sub["type"], "subscription_linked");
        assert_eq!(sub["subscription_id"], "123");
    }
}
