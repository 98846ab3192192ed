//! Email trigger rules and send-time computation.
//!
//! A rule declares which lifecycle event it listens to, which courses it
//! applies to, and when the resulting email becomes eligible to send.
//! Everything here is pure: identical `(rule, now, offset)` inputs always
//! yield the identical result, which is what makes re-evaluation and
//! testing safe. Actual delivery is out of scope — the scheduler only
//! decides *whether* and *when*.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::event::LifecycleEventKind;
use crate::types::{CourseId, DbId, UserId};

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_MINUTE: i64 = 60;

// ---------------------------------------------------------------------------
// TriggerEvent
// ---------------------------------------------------------------------------

/// The lifecycle event kind a rule fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    ChapterEntered,
    ChapterFinished,
    ChapterUnfinished,
    CourseCompleted,
    CourseGranted,
}

impl TriggerEvent {
    /// Whether an event kind matches this trigger.
    pub fn matches(&self, kind: &LifecycleEventKind) -> bool {
        matches!(
            (self, kind),
            (Self::ChapterEntered, LifecycleEventKind::ChapterEntered { .. })
                | (Self::ChapterFinished, LifecycleEventKind::ChapterFinished { .. })
                | (Self::ChapterUnfinished, LifecycleEventKind::ChapterUnfinished { .. })
                | (Self::CourseCompleted, LifecycleEventKind::CourseCompleted { .. })
                | (Self::CourseGranted, LifecycleEventKind::CourseGranted { .. })
        )
    }
}

// ---------------------------------------------------------------------------
// Send mode
// ---------------------------------------------------------------------------

/// Delay unit for delayed sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Day,
    Hour,
    Minute,
}

impl DelayUnit {
    pub fn seconds(&self) -> i64 {
        match self {
            Self::Day => SECONDS_PER_DAY,
            Self::Hour => SECONDS_PER_HOUR,
            Self::Minute => SECONDS_PER_MINUTE,
        }
    }
}

/// When the email becomes eligible relative to the triggering event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SendMode {
    /// Eligible as soon as the event is processed.
    Immediate,

    /// Eligible `value` units after the event.
    Delayed { value: i64, unit: DelayUnit },
}

// ---------------------------------------------------------------------------
// Time window
// ---------------------------------------------------------------------------

/// A local wall-clock time, `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    pub hour: u8,
    pub minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }
}

impl std::str::FromStr for ClockTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid clock time {s:?}, expected HH:MM"))?;
        let hour: u8 = h.parse().map_err(|_| format!("invalid hour in {s:?}"))?;
        let minute: u8 = m.parse().map_err(|_| format!("invalid minute in {s:?}"))?;
        Self::new(hour, minute).ok_or_else(|| format!("clock time out of range: {s:?}"))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(t: ClockTime) -> Self {
        format!("{:02}:{:02}", t.hour, t.minute)
    }
}

/// Preferred local send window. Only `start` participates in send-time
/// computation; `end` is carried for display and future narrowing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: ClockTime,
    pub end: Option<ClockTime>,
}

// ---------------------------------------------------------------------------
// Audience
// ---------------------------------------------------------------------------

/// Who the rule addresses.
///
/// Modes other than `Each` are declared but currently always evaluate as
/// eligible — an explicit extension point, not a completed feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "audience", rename_all = "snake_case")]
pub enum Audience {
    /// Every matching learner individually.
    Each,
    /// All learners at once.
    All,
    /// Only when more than `count` learners match.
    QuantityGreaterThan { count: u32 },
}

// ---------------------------------------------------------------------------
// TriggerCondition / EmailRule
// ---------------------------------------------------------------------------

/// Declarative trigger condition attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerCondition {
    /// Event kind the rule listens to.
    pub trigger_at: TriggerEvent,

    /// Courses the rule applies to; empty means all courses.
    pub course_ids: BTreeSet<CourseId>,

    pub mode: SendMode,

    pub time_window: Option<TimeWindow>,

    pub audience: Audience,
}

/// Rule lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Draft,
    Active,
    Disabled,
}

/// An automated notification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRule {
    pub id: DbId,
    pub status: RuleStatus,
    pub subject: String,
    pub body_template: String,
    /// Absent means the rule can never fire.
    pub trigger: Option<TriggerCondition>,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Whether `rule` is eligible for `(user, course)`.
pub fn can_trigger(rule: &EmailRule, _user_id: &UserId, course_id: &CourseId) -> bool {
    let Some(condition) = rule.trigger.as_ref() else {
        return false;
    };

    if !condition.course_ids.is_empty() && !condition.course_ids.contains(course_id) {
        return false;
    }

    match condition.audience {
        Audience::Each => true,
        // Extension point: aggregate audiences are declared but not yet
        // evaluated, and fall through as eligible.
        Audience::All | Audience::QuantityGreaterThan { .. } => true,
    }
}

/// Compute the send timestamp (epoch seconds) for `rule` evaluated at `now`.
///
/// Returns `None` when the rule has no trigger. The result is guaranteed
/// to be `>= now` for immediate sends and `>= base` for delayed sends,
/// aligned to the window's local start time when one is configured.
pub fn compute_send_timestamp(rule: &EmailRule, now: i64, local_offset: FixedOffset) -> Option<i64> {
    let condition = rule.trigger.as_ref()?;

    match &condition.mode {
        SendMode::Immediate => Some(now),
        SendMode::Delayed { value, unit } => {
            let base = now + value * unit.seconds();
            let at = match condition.time_window.as_ref() {
                Some(window) => next_local_occurrence(base, window.start, local_offset),
                None => base,
            };
            Some(at)
        }
    }
}

/// Earliest instant at or after `base` whose local wall-clock time is `at`.
///
/// Computes `at` on `base`'s local calendar day, then advances by exactly
/// one day when that instant is strictly earlier than `base`.
pub fn next_local_occurrence(base: i64, at: ClockTime, offset: FixedOffset) -> i64 {
    let Some(utc) = DateTime::<Utc>::from_timestamp(base, 0) else {
        return base;
    };
    let local_day = utc.with_timezone(&offset).date_naive();

    let Some(naive) = local_day.and_hms_opt(u32::from(at.hour), u32::from(at.minute), 0) else {
        return base;
    };
    let Some(candidate) = naive.and_local_timezone(offset).single() else {
        return base;
    };

    let mut ts = candidate.timestamp();
    if ts < base {
        ts += SECONDS_PER_DAY;
    }
    ts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
