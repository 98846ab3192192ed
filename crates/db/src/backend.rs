//! Storage backend traits the engine is written against.
//!
//! [`PgBackend`] delegates to the sqlx repositories; [`crate::memory`]
//! provides an in-memory implementation for embedded use and tests.

use async_trait::async_trait;

use coursekit_core::grant::AccessGrant;
use coursekit_core::trigger::EmailRule;
use coursekit_core::types::{DbId, GrantKey};

use crate::models::{
    AuditLogEntry, AuditLogFilter, NewAuditLogEntry, NewScheduledEmail, ScheduledEmail,
    UpdateAuditLogEntry,
};
use crate::{DbPool, StorageError};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Backing storage for access grants. A grant write replaces the whole
/// record in one statement (atomic at the storage boundary).
#[async_trait]
pub trait AccessGrantBackend: Send + Sync {
    async fn fetch(&self, key: &GrantKey) -> Result<Option<AccessGrant>, StorageError>;
    async fn upsert(&self, grant: &AccessGrant) -> Result<(), StorageError>;
}

/// Backing storage for student activity logs.
#[async_trait]
pub trait StudentLogBackend: Send + Sync {
    async fn insert(&self, entry: &NewAuditLogEntry) -> Result<AuditLogEntry, StorageError>;
    async fn fetch(&self, id: DbId) -> Result<Option<AuditLogEntry>, StorageError>;
    async fn query(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLogEntry>, StorageError>;
    async fn update(
        &self,
        id: DbId,
        patch: &UpdateAuditLogEntry,
    ) -> Result<Option<AuditLogEntry>, StorageError>;
    async fn delete(&self, id: DbId) -> Result<bool, StorageError>;
}

/// Read access to notification rules.
#[async_trait]
pub trait EmailRuleBackend: Send + Sync {
    async fn list_active(&self) -> Result<Vec<EmailRule>, StorageError>;
}

/// Sink for computed send decisions.
#[async_trait]
pub trait EmailQueueBackend: Send + Sync {
    async fn enqueue(&self, item: &NewScheduledEmail) -> Result<ScheduledEmail, StorageError>;
}

// ---------------------------------------------------------------------------
// PgBackend
// ---------------------------------------------------------------------------

/// PostgreSQL implementation of all backend traits.
#[derive(Clone)]
pub struct PgBackend {
    pool: DbPool,
}

impl PgBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl AccessGrantBackend for PgBackend {
    async fn fetch(&self, key: &GrantKey) -> Result<Option<AccessGrant>, StorageError> {
        let row = crate::repositories::AccessGrantRepo::find(&self.pool, key).await?;
        row.map(|r| r.into_domain()).transpose().map_err(Into::into)
    }

    async fn upsert(&self, grant: &AccessGrant) -> Result<(), StorageError> {
        crate::repositories::AccessGrantRepo::upsert(&self.pool, grant).await?;
        Ok(())
    }
}

#[async_trait]
impl StudentLogBackend for PgBackend {
    async fn insert(&self, entry: &NewAuditLogEntry) -> Result<AuditLogEntry, StorageError> {
        Ok(crate::repositories::StudentLogRepo::insert(&self.pool, entry).await?)
    }

    async fn fetch(&self, id: DbId) -> Result<Option<AuditLogEntry>, StorageError> {
        Ok(crate::repositories::StudentLogRepo::find(&self.pool, id).await?)
    }

    async fn query(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLogEntry>, StorageError> {
        Ok(crate::repositories::StudentLogRepo::query(&self.pool, filter).await?)
    }

    async fn update(
        &self,
        id: DbId,
        patch: &UpdateAuditLogEntry,
    ) -> Result<Option<AuditLogEntry>, StorageError> {
        Ok(crate::repositories::StudentLogRepo::update(&self.pool, id, patch).await?)
    }

    async fn delete(&self, id: DbId) -> Result<bool, StorageError> {
        Ok(crate::repositories::StudentLogRepo::delete(&self.pool, id).await?)
    }
}

#[async_trait]
impl EmailRuleBackend for PgBackend {
    async fn list_active(&self) -> Result<Vec<EmailRule>, StorageError> {
        let rows = crate::repositories::EmailRuleRepo::list_active(&self.pool).await?;
        rows.into_iter()
            .map(|r| r.into_domain().map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl EmailQueueBackend for PgBackend {
    async fn enqueue(&self, item: &NewScheduledEmail) -> Result<ScheduledEmail, StorageError> {
        Ok(crate::repositories::EmailQueueRepo::insert(&self.pool, item).await?)
    }
}
