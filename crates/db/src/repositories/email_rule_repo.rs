//! Repository for the `email_rules` table.

use sqlx::PgPool;

use coursekit_core::types::DbId;

use crate::models::EmailRuleRow;

/// Column list for `email_rules` SELECT queries.
const COLUMNS: &str = "\
    id, status, subject, body_template, trigger_condition, created_at, updated_at";

/// Read access to notification rules. Authoring happens in the admin
/// surface, outside this core.
pub struct EmailRuleRepo;

impl EmailRuleRepo {
    /// Fetch one rule by id.
    pub async fn find(pool: &PgPool, id: DbId) -> Result<Option<EmailRuleRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM email_rules WHERE id = $1");
        sqlx::query_as::<_, EmailRuleRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All rules currently eligible for evaluation.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<EmailRuleRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM email_rules WHERE status = 'active' ORDER BY id");
        sqlx::query_as::<_, EmailRuleRow>(&query).fetch_all(pool).await
    }
}
