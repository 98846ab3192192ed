//! Repository for the `email_queue` table.

use sqlx::PgPool;

use crate::models::{NewScheduledEmail, ScheduledEmail};

/// Column list for `email_queue` SELECT queries.
const COLUMNS: &str = "id, rule_id, user_id, course_id, send_at, created_at";

/// Queue of computed send decisions. An external sender drains it; this
/// core only writes.
pub struct EmailQueueRepo;

impl EmailQueueRepo {
    /// Enqueue one send decision.
    pub async fn insert(
        pool: &PgPool,
        item: &NewScheduledEmail,
    ) -> Result<ScheduledEmail, sqlx::Error> {
        let query = format!(
            "INSERT INTO email_queue (rule_id, user_id, course_id, send_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScheduledEmail>(&query)
            .bind(item.rule_id)
            .bind(&item.user_id)
            .bind(&item.course_id)
            .bind(item.send_at)
            .fetch_one(pool)
            .await
    }

    /// Entries whose send time is at or before `epoch`, oldest first.
    pub async fn list_due(pool: &PgPool, epoch: i64) -> Result<Vec<ScheduledEmail>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM email_queue WHERE send_at <= $1 ORDER BY send_at, id"
        );
        sqlx::query_as::<_, ScheduledEmail>(&query)
            .bind(epoch)
            .fetch_all(pool)
            .await
    }
}
