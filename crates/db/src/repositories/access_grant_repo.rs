//! Repository for the `access_grants` table.

use sqlx::PgPool;

use coursekit_core::grant::AccessGrant;
use coursekit_core::types::GrantKey;

use crate::models::AccessGrantRow;

/// Column list for `access_grants` SELECT queries.
const COLUMNS: &str = "\
    course_id, user_id, expiry, finished_chapter_ids, first_visit_times, \
    already_completed, last_visit, created_at, updated_at";

/// Provides fetch and upsert over access grants.
///
/// The whole record is written in one statement, so a grant mutation is
/// atomic at the storage boundary.
pub struct AccessGrantRepo;

impl AccessGrantRepo {
    /// Fetch one grant by (course, user).
    pub async fn find(pool: &PgPool, key: &GrantKey) -> Result<Option<AccessGrantRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM access_grants WHERE course_id = $1 AND user_id = $2");
        sqlx::query_as::<_, AccessGrantRow>(&query)
            .bind(&key.course_id)
            .bind(&key.user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or fully replace a grant.
    pub async fn upsert(pool: &PgPool, grant: &AccessGrant) -> Result<(), sqlx::Error> {
        let expiry = serde_json::to_value(&grant.expiry)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let finished = serde_json::to_value(&grant.finished_chapter_ids)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let first_visits = serde_json::to_value(&grant.first_visit_times)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let last_visit = grant
            .last_visit
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            "INSERT INTO access_grants \
                 (course_id, user_id, expiry, finished_chapter_ids, first_visit_times, \
                  already_completed, last_visit) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (course_id, user_id) DO UPDATE SET \
                 expiry = EXCLUDED.expiry, \
                 finished_chapter_ids = EXCLUDED.finished_chapter_ids, \
                 first_visit_times = EXCLUDED.first_visit_times, \
                 already_completed = EXCLUDED.already_completed, \
                 last_visit = EXCLUDED.last_visit, \
                 updated_at = now()",
        )
        .bind(&grant.course_id)
        .bind(&grant.user_id)
        .bind(expiry)
        .bind(finished)
        .bind(first_visits)
        .bind(grant.already_completed)
        .bind(last_visit)
        .execute(pool)
        .await?;

        Ok(())
    }
}
