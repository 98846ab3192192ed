//! Row form of the access grant.
//!
//! Set- and map-valued fields are stored as JSONB; the row converts to
//! and from the domain [`AccessGrant`].

use serde_json::Value;
use sqlx::FromRow;

use coursekit_core::grant::{AccessGrant, ExpiryDescriptor, LastVisit};
use coursekit_core::types::Timestamp;

/// A row from the `access_grants` table.
#[derive(Debug, Clone, FromRow)]
pub struct AccessGrantRow {
    pub course_id: String,
    pub user_id: String,
    pub expiry: Value,
    pub finished_chapter_ids: Value,
    pub first_visit_times: Value,
    pub already_completed: bool,
    pub last_visit: Option<Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AccessGrantRow {
    /// Decode the JSONB columns into the domain grant.
    pub fn into_domain(self) -> Result<AccessGrant, serde_json::Error> {
        let expiry: ExpiryDescriptor = serde_json::from_value(self.expiry)?;
        let finished_chapter_ids = serde_json::from_value(self.finished_chapter_ids)?;
        let first_visit_times = serde_json::from_value(self.first_visit_times)?;
        let last_visit: Option<LastVisit> = match self.last_visit {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };

        Ok(AccessGrant {
            course_id: self.course_id,
            user_id: self.user_id,
            expiry,
            finished_chapter_ids,
            first_visit_times,
            already_completed: self.already_completed,
            last_visit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn row_decodes_into_domain_grant() {
        let now = Utc::now();
        let row = AccessGrantRow {
            course_id: "c1".into(),
            user_id: "u1".into(),
            expiry: serde_json::json!({"type": "fixed", "epoch": 0}),
            finished_chapter_ids: serde_json::json!(["ch1", "ch2"]),
            first_visit_times: serde_json::json!({}),
            already_completed: false,
            last_visit: None,
            created_at: now,
            updated_at: now,
        };

        let grant = row.into_domain().unwrap();
        assert_eq!(grant.expiry, ExpiryDescriptor::Fixed { epoch: 0 });
        assert_eq!(grant.finished_chapter_ids.len(), 2);
        assert!(grant.last_visit.is_none());
    }

    #[test]
    fn malformed_expiry_column_is_a_decode_error() {
        let now = Utc::now();
        let row = AccessGrantRow {
            course_id: "c1".into(),
            user_id: "u1".into(),
            expiry: serde_json::json!({"type": "perpetual"}),
            finished_chapter_ids: serde_json::json!([]),
            first_visit_times: serde_json::json!({}),
            already_completed: false,
            last_visit: None,
            created_at: now,
            updated_at: now,
        };
        assert!(row.into_domain().is_err());
    }
}
