//! Repository for the `student_logs` table.

use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};

use coursekit_core::types::DbId;

use crate::models::{AuditLogEntry, AuditLogFilter, NewAuditLogEntry, UpdateAuditLogEntry};

/// Column list for `student_logs` SELECT queries.
const COLUMNS: &str = "\
    id, user_id, course_id, chapter_id, title, content, log_type, \
    client_ip, created_at";

/// Default page size for list queries.
const DEFAULT_LIMIT: i64 = 100;

/// Hard cap on page size.
const MAX_LIMIT: i64 = 500;

/// Provides insert and filtered query operations for student logs.
pub struct StudentLogRepo;

impl StudentLogRepo {
    /// Append one entry.
    pub async fn insert(
        pool: &PgPool,
        entry: &NewAuditLogEntry,
    ) -> Result<AuditLogEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO student_logs \
                 (user_id, course_id, chapter_id, title, content, log_type, client_ip, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditLogEntry>(&query)
            .bind(&entry.user_id)
            .bind(&entry.course_id)
            .bind(&entry.chapter_id)
            .bind(&entry.title)
            .bind(&entry.content)
            .bind(&entry.log_type)
            .bind(&entry.client_ip)
            .bind(entry.created_at)
            .fetch_one(pool)
            .await
    }

    /// Fetch one entry by id.
    pub async fn find(pool: &PgPool, id: DbId) -> Result<Option<AuditLogEntry>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM student_logs WHERE id = $1");
        sqlx::query_as::<_, AuditLogEntry>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Query entries matching `filter`, newest first.
    pub async fn query(
        pool: &PgPool,
        filter: &AuditLogFilter,
    ) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = filter.offset.unwrap_or(0);

        let (where_clause, binds) = build_filter(filter);
        let query = format!(
            "SELECT {COLUMNS} FROM student_logs {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${} OFFSET ${}",
            binds.len() + 1,
            binds.len() + 2
        );

        let mut q = sqlx::query_as::<_, AuditLogEntry>(&query);
        q = bind_values(q, &binds);
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Apply an administrative correction. Returns the updated entry,
    /// or `None` when the id does not exist.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        patch: &UpdateAuditLogEntry,
    ) -> Result<Option<AuditLogEntry>, sqlx::Error> {
        let query = format!(
            "UPDATE student_logs SET \
                 title = COALESCE($2, title), \
                 content = COALESCE($3, content) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditLogEntry>(&query)
            .bind(id)
            .bind(&patch.title)
            .bind(&patch.content)
            .fetch_optional(pool)
            .await
    }

    /// Delete one entry. Returns whether a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM student_logs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Build the WHERE clause and the ordered bind values for `filter`.
fn build_filter(filter: &AuditLogFilter) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    let mut push = |conditions: &mut Vec<String>, binds: &mut Vec<String>, column: &str, value: &Option<String>| {
        if let Some(v) = value {
            binds.push(v.clone());
            conditions.push(format!("{column} = ${}", binds.len()));
        }
    };

    push(&mut conditions, &mut binds, "user_id", &filter.user_id);
    push(&mut conditions, &mut binds, "course_id", &filter.course_id);
    push(&mut conditions, &mut binds, "chapter_id", &filter.chapter_id);
    push(&mut conditions, &mut binds, "log_type", &filter.log_type);

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, binds)
}

fn bind_values<'q>(
    mut q: QueryAs<'q, Postgres, AuditLogEntry, PgArguments>,
    binds: &'q [String],
) -> QueryAs<'q, Postgres, AuditLogEntry, PgArguments> {
    for value in binds {
        q = q.bind(value);
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_has_no_where_clause() {
        let (clause, binds) = build_filter(&AuditLogFilter::default());
        assert!(clause.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn filter_conditions_are_numbered_in_order() {
        let filter = AuditLogFilter {
            user_id: Some("u1".into()),
            log_type: Some("chapter_finish".into()),
            ..Default::default()
        };
        let (clause, binds) = build_filter(&filter);
        assert_eq!(clause, "WHERE user_id = $1 AND log_type = $2");
        assert_eq!(binds, vec!["u1".to_string(), "chapter_finish".to_string()]);
    }
}
