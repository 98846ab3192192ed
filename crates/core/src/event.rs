//! Lifecycle event envelope and typed event kinds.
//!
//! Events are ephemeral: the bus delivers them synchronously and nothing
//! persists or replays them. Consumers needing durability (the audit
//! log) write their own records from the event data.

use serde::{Deserialize, Serialize};

use crate::types::{ChapterId, CourseId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// LifecycleEventKind
// ---------------------------------------------------------------------------

/// A milestone state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEventKind {
    /// First time the learner opened a chapter.
    ChapterEntered {
        chapter_id: ChapterId,
        course_id: CourseId,
        user_id: UserId,
    },

    /// A chapter was toggled to finished.
    ChapterFinished {
        chapter_id: ChapterId,
        course_id: CourseId,
        user_id: UserId,
    },

    /// A chapter was toggled back to unfinished.
    ChapterUnfinished {
        chapter_id: ChapterId,
        course_id: CourseId,
        user_id: UserId,
    },

    /// Every leaf chapter of the course is finished. Emitted at most
    /// once per grant.
    CourseCompleted {
        course_id: CourseId,
        user_id: UserId,
    },

    /// Access to the course was granted. Published by the external
    /// purchase workflow, not by this core; carried here so trigger
    /// rules and the audit trail can react to it.
    CourseGranted {
        course_id: CourseId,
        user_id: UserId,
    },
}

impl LifecycleEventKind {
    /// Dot-separated event name, e.g. `"chapter.finished"`.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ChapterEntered { .. } => "chapter.entered",
            Self::ChapterFinished { .. } => "chapter.finished",
            Self::ChapterUnfinished { .. } => "chapter.unfinished",
            Self::CourseCompleted { .. } => "course.completed",
            Self::CourseGranted { .. } => "course.granted",
        }
    }

    pub fn course_id(&self) -> &CourseId {
        match self {
            Self::ChapterEntered { course_id, .. }
            | Self::ChapterFinished { course_id, .. }
            | Self::ChapterUnfinished { course_id, .. }
            | Self::CourseCompleted { course_id, .. }
            | Self::CourseGranted { course_id, .. } => course_id,
        }
    }

    pub fn user_id(&self) -> &UserId {
        match self {
            Self::ChapterEntered { user_id, .. }
            | Self::ChapterFinished { user_id, .. }
            | Self::ChapterUnfinished { user_id, .. }
            | Self::CourseCompleted { user_id, .. }
            | Self::CourseGranted { user_id, .. } => user_id,
        }
    }

    pub fn chapter_id(&self) -> Option<&ChapterId> {
        match self {
            Self::ChapterEntered { chapter_id, .. }
            | Self::ChapterFinished { chapter_id, .. }
            | Self::ChapterUnfinished { chapter_id, .. } => Some(chapter_id),
            Self::CourseCompleted { .. } | Self::CourseGranted { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// Event envelope: the typed kind plus delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: LifecycleEventKind,

    /// When the transition happened (UTC).
    pub at: Timestamp,

    /// Client IP of the acting user, for audit trail stamping.
    pub client_ip: Option<String>,
}

impl LifecycleEvent {
    pub fn new(kind: LifecycleEventKind, at: Timestamp) -> Self {
        Self {
            kind,
            at,
            client_ip: None,
        }
    }

    /// Attach the acting client's IP to the event.
    pub fn with_client_ip(mut self, ip: Option<String>) -> Self {
        self.client_ip = ip;
        self
    }
}
