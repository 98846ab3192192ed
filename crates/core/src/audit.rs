//! Student log type allow-list.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! both the engine and the repository layer.

/// Known log types for student activity entries.
pub mod log_types {
    pub const CHAPTER_ENTER: &str = "chapter_enter";
    pub const CHAPTER_FINISH: &str = "chapter_finish";
    pub const CHAPTER_UNFINISH: &str = "chapter_unfinish";
    pub const COURSE_FINISH: &str = "course_finish";
    pub const COURSE_GRANTED: &str = "course_granted";

    /// Fallback for values outside the allow-list.
    pub const UNKNOWN: &str = "unknown";
}

/// All accepted log type values.
pub const ALLOWED_LOG_TYPES: &[&str] = &[
    log_types::CHAPTER_ENTER,
    log_types::CHAPTER_FINISH,
    log_types::CHAPTER_UNFINISH,
    log_types::COURSE_FINISH,
    log_types::COURSE_GRANTED,
];

/// Whether `log_type` is in the allow-list.
pub fn is_allowed_log_type(log_type: &str) -> bool {
    ALLOWED_LOG_TYPES.contains(&log_type)
}

/// Map a log type to its stored form.
///
/// Unknown values are not rejected — losing an audit entry is worse than
/// mis-classifying it — so they collapse to [`log_types::UNKNOWN`].
pub fn normalize_log_type(log_type: &str) -> &str {
    if is_allowed_log_type(log_type) {
        log_type
    } else {
        log_types::UNKNOWN
    }
}
