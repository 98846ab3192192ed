//! In-memory implementation of the storage backend traits.
//!
//! Used for embedded/single-process deployments and throughout the test
//! suites. Semantics mirror the PostgreSQL backend: grant writes replace
//! the whole record, log queries return newest first.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use coursekit_core::grant::AccessGrant;
use coursekit_core::trigger::{EmailRule, RuleStatus};
use coursekit_core::types::{DbId, GrantKey};

use crate::backend::{AccessGrantBackend, EmailQueueBackend, EmailRuleBackend, StudentLogBackend};
use crate::models::{
    AuditLogEntry, AuditLogFilter, NewAuditLogEntry, NewScheduledEmail, ScheduledEmail,
    UpdateAuditLogEntry,
};
use crate::StorageError;

#[derive(Default)]
struct Inner {
    grants: HashMap<GrantKey, AccessGrant>,
    logs: BTreeMap<DbId, AuditLogEntry>,
    next_log_id: DbId,
    rules: Vec<EmailRule>,
    queue: Vec<ScheduledEmail>,
    next_queue_id: DbId,
}

/// In-memory backend. Cheap to clone behind an `Arc`; all state sits
/// under one mutex, which is fine at test/embedded scale.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a grant, standing in for the external purchase workflow.
    pub fn seed_grant(&self, grant: AccessGrant) {
        let key = GrantKey::new(grant.course_id.clone(), grant.user_id.clone());
        self.lock().grants.insert(key, grant);
    }

    /// Seed a notification rule.
    pub fn seed_rule(&self, rule: EmailRule) {
        self.lock().rules.push(rule);
    }

    /// Snapshot of the scheduled-send queue.
    pub fn queued(&self) -> Vec<ScheduledEmail> {
        self.lock().queue.clone()
    }

    /// Number of stored log entries.
    pub fn log_count(&self) -> usize {
        self.lock().logs.len()
    }

    /// Make subsequent writes fail, for storage-failure tests.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Mutex poisoning only happens after a panic in another test
        // thread; propagating the inner state is still sound.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("simulated write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccessGrantBackend for MemoryBackend {
    async fn fetch(&self, key: &GrantKey) -> Result<Option<AccessGrant>, StorageError> {
        Ok(self.lock().grants.get(key).cloned())
    }

    async fn upsert(&self, grant: &AccessGrant) -> Result<(), StorageError> {
        self.check_writable()?;
        let key = GrantKey::new(grant.course_id.clone(), grant.user_id.clone());
        self.lock().grants.insert(key, grant.clone());
        Ok(())
    }
}

#[async_trait]
impl StudentLogBackend for MemoryBackend {
    async fn insert(&self, entry: &NewAuditLogEntry) -> Result<AuditLogEntry, StorageError> {
        self.check_writable()?;
        let mut inner = self.lock();
        inner.next_log_id += 1;
        let stored = AuditLogEntry {
            id: inner.next_log_id,
            user_id: entry.user_id.clone(),
            course_id: entry.course_id.clone(),
            chapter_id: entry.chapter_id.clone(),
            title: entry.title.clone(),
            content: entry.content.clone(),
            log_type: entry.log_type.clone(),
            client_ip: entry.client_ip.clone(),
            created_at: entry.created_at,
        };
        inner.logs.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn fetch(&self, id: DbId) -> Result<Option<AuditLogEntry>, StorageError> {
        Ok(self.lock().logs.get(&id).cloned())
    }

    async fn query(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLogEntry>, StorageError> {
        let inner = self.lock();
        let mut matches: Vec<AuditLogEntry> = inner
            .logs
            .values()
            .filter(|e| {
                filter.user_id.as_ref().map_or(true, |v| *v == e.user_id)
                    && filter.course_id.as_ref().map_or(true, |v| *v == e.course_id)
                    && filter
                        .chapter_id
                        .as_ref()
                        .map_or(true, |v| Some(v) == e.chapter_id.as_ref())
                    && filter.log_type.as_ref().map_or(true, |v| *v == e.log_type)
            })
            .cloned()
            .collect();

        // Newest first, same as the SQL ORDER BY created_at DESC, id DESC.
        matches.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(i64::MAX).max(0) as usize;
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn update(
        &self,
        id: DbId,
        patch: &UpdateAuditLogEntry,
    ) -> Result<Option<AuditLogEntry>, StorageError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let Some(entry) = inner.logs.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            entry.title = title.clone();
        }
        if let Some(content) = &patch.content {
            entry.content = content.clone();
        }
        Ok(Some(entry.clone()))
    }

    async fn delete(&self, id: DbId) -> Result<bool, StorageError> {
        self.check_writable()?;
        Ok(self.lock().logs.remove(&id).is_some())
    }
}

#[async_trait]
impl EmailRuleBackend for MemoryBackend {
    async fn list_active(&self) -> Result<Vec<EmailRule>, StorageError> {
        Ok(self
            .lock()
            .rules
            .iter()
            .filter(|r| r.status == RuleStatus::Active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EmailQueueBackend for MemoryBackend {
    async fn enqueue(&self, item: &NewScheduledEmail) -> Result<ScheduledEmail, StorageError> {
        self.check_writable()?;
        let mut inner = self.lock();
        inner.next_queue_id += 1;
        let stored = ScheduledEmail {
            id: inner.next_queue_id,
            rule_id: item.rule_id,
            user_id: item.user_id.clone(),
            course_id: item.course_id.clone(),
            send_at: item.send_at,
            created_at: Utc::now(),
        };
        inner.queue.push(stored.clone());
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
