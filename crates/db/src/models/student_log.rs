//! Student activity log entities and DTOs.
//!
//! Entries are append-only and immutable in the normal flow; the update
//! and delete operations exist for administrative corrections only.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use coursekit_core::types::{DbId, Timestamp};

/// A single student activity entry. No `updated_at` — entries are
/// written once.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct AuditLogEntry {
    pub id: DbId,
    pub user_id: String,
    pub course_id: String,
    pub chapter_id: Option<String>,
    pub title: String,
    pub content: String,
    pub log_type: String,
    pub client_ip: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for inserting a new entry. `log_type` is expected to be
/// normalized against the allow-list before it reaches storage.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAuditLogEntry {
    pub user_id: String,
    pub course_id: String,
    pub chapter_id: Option<String>,
    pub title: String,
    pub content: String,
    pub log_type: String,
    pub client_ip: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for administrative corrections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAuditLogEntry {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Filter for list queries.
///
/// Serialized (JSON) form doubles as the list-cache key, so field order
/// and types must stay deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditLogFilter {
    pub user_id: Option<String>,
    pub course_id: Option<String>,
    pub chapter_id: Option<String>,
    pub log_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditLogFilter {
    /// Canonical cache key for this filter.
    pub fn cache_key(&self) -> String {
        // Struct serialization order is fixed, so this is canonical.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether the filter references the given (course, user) pair,
    /// used by the manual invalidation hook.
    pub fn references(&self, course_id: &str, user_id: &str) -> bool {
        self.course_id.as_deref() == Some(course_id) || self.user_id.as_deref() == Some(user_id)
    }
}
