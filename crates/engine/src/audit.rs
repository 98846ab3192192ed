//! Student activity log: cached reads, append-only writes, and the
//! subscriber that turns lifecycle events into entries.
//!
//! Caching is deliberately asymmetric. List results are cached per
//! filter and NOT invalidated by appends; readers of list views accept
//! staleness until an explicit invalidation. Single-entry reads are
//! cached by id and invalidated by the administrative update/delete
//! operations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use coursekit_core::audit::{log_types, normalize_log_type};
use coursekit_core::types::{ChapterId, CourseId, DbId, UserId};
use coursekit_core::{Clock, LifecycleEvent, LifecycleEventKind};
use coursekit_db::models::{AuditLogEntry, AuditLogFilter, NewAuditLogEntry, UpdateAuditLogEntry};
use coursekit_db::StudentLogBackend;
use coursekit_events::{LifecycleSubscriber, SubscriberError};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// LogDraft
// ---------------------------------------------------------------------------

/// An entry as submitted by callers. The store stamps `created_at` and
/// normalizes `log_type` before it reaches storage.
#[derive(Debug, Clone)]
pub struct LogDraft {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub chapter_id: Option<ChapterId>,
    pub title: String,
    pub content: String,
    pub log_type: String,
    pub client_ip: Option<String>,
}

// ---------------------------------------------------------------------------
// AuditLogStore
// ---------------------------------------------------------------------------

pub struct AuditLogStore {
    backend: Arc<dyn StudentLogBackend>,
    clock: Arc<dyn Clock>,
    list_cache: RwLock<HashMap<String, (AuditLogFilter, Vec<AuditLogEntry>)>>,
    entry_cache: RwLock<HashMap<DbId, AuditLogEntry>>,
}

impl AuditLogStore {
    pub fn new(backend: Arc<dyn StudentLogBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            list_cache: RwLock::new(HashMap::new()),
            entry_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Append an entry. Does not touch the list cache.
    pub async fn add(&self, draft: LogDraft) -> Result<DbId, EngineError> {
        let log_type = normalize_log_type(&draft.log_type).to_string();
        if log_type != draft.log_type {
            tracing::warn!(
                supplied = %draft.log_type,
                "Unknown log type, stored as \"{}\"",
                log_types::UNKNOWN
            );
        }

        let entry = NewAuditLogEntry {
            user_id: draft.user_id,
            course_id: draft.course_id,
            chapter_id: draft.chapter_id,
            title: draft.title,
            content: draft.content,
            log_type,
            client_ip: draft.client_ip,
            created_at: self.clock.now(),
        };
        let stored = self.backend.insert(&entry).await?;
        Ok(stored.id)
    }

    /// List entries matching `filter`, from cache when the exact filter
    /// was queried before.
    pub async fn get_list(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLogEntry>, EngineError> {
        let key = filter.cache_key();
        if let Some((_, cached)) = self.read_lists().get(&key) {
            return Ok(cached.clone());
        }
        let results = self.backend.query(filter).await?;
        self.write_lists()
            .insert(key, (filter.clone(), results.clone()));
        Ok(results)
    }

    /// Fetch a single entry by id, cached.
    pub async fn get(&self, id: DbId) -> Result<Option<AuditLogEntry>, EngineError> {
        if let Some(entry) = self.read_entries().get(&id).cloned() {
            return Ok(Some(entry));
        }
        let fetched = self.backend.fetch(id).await?;
        if let Some(entry) = &fetched {
            self.write_entries().insert(id, entry.clone());
        }
        Ok(fetched)
    }

    /// Administrative correction. Invalidates the id cache for `id`
    /// only; list caches are left to the explicit invalidation hook.
    pub async fn update(
        &self,
        id: DbId,
        patch: &UpdateAuditLogEntry,
    ) -> Result<Option<AuditLogEntry>, EngineError> {
        let updated = self.backend.update(id, patch).await?;
        self.write_entries().remove(&id);
        Ok(updated)
    }

    /// Administrative removal. Same cache policy as [`Self::update`].
    pub async fn delete(&self, id: DbId) -> Result<bool, EngineError> {
        let deleted = self.backend.delete(id).await?;
        self.write_entries().remove(&id);
        Ok(deleted)
    }

    /// Drop every cached list whose filter references the pair, and any
    /// cached entries belonging to it.
    pub fn invalidate_for(&self, course_id: &str, user_id: &str) {
        self.write_lists()
            .retain(|_, (filter, _)| !filter.references(course_id, user_id));
        self.write_entries()
            .retain(|_, entry| !(entry.course_id == course_id && entry.user_id == user_id));
    }

    /// Number of cached list results. Observability helper.
    pub fn cached_list_count(&self) -> usize {
        self.read_lists().len()
    }

    fn read_lists(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, (AuditLogFilter, Vec<AuditLogEntry>)>> {
        self.list_cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lists(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, (AuditLogFilter, Vec<AuditLogEntry>)>> {
        self.list_cache.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<DbId, AuditLogEntry>> {
        self.entry_cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<DbId, AuditLogEntry>> {
        self.entry_cache.write().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// AuditLogWriter
// ---------------------------------------------------------------------------

/// Bus subscriber that records every lifecycle event as a log entry.
pub struct AuditLogWriter {
    store: Arc<AuditLogStore>,
}

impl AuditLogWriter {
    pub fn new(store: Arc<AuditLogStore>) -> Self {
        Self { store }
    }

    fn draft_for(event: &LifecycleEvent) -> LogDraft {
        let kind = &event.kind;
        let (title, log_type) = match kind {
            LifecycleEventKind::ChapterEntered { chapter_id, .. } => (
                format!("Entered chapter #{chapter_id}"),
                log_types::CHAPTER_ENTER,
            ),
            LifecycleEventKind::ChapterFinished { chapter_id, .. } => (
                format!("Finished chapter #{chapter_id}"),
                log_types::CHAPTER_FINISH,
            ),
            LifecycleEventKind::ChapterUnfinished { chapter_id, .. } => (
                format!("Marked chapter #{chapter_id} unfinished"),
                log_types::CHAPTER_UNFINISH,
            ),
            LifecycleEventKind::CourseCompleted { course_id, .. } => (
                format!("Completed course #{course_id}"),
                log_types::COURSE_FINISH,
            ),
            LifecycleEventKind::CourseGranted { course_id, .. } => (
                format!("Granted access to course #{course_id}"),
                log_types::COURSE_GRANTED,
            ),
        };
        LogDraft {
            user_id: kind.user_id().clone(),
            course_id: kind.course_id().clone(),
            chapter_id: kind.chapter_id().cloned(),
            title,
            content: String::new(),
            log_type: log_type.to_string(),
            client_ip: event.client_ip.clone(),
        }
    }
}

#[async_trait]
impl LifecycleSubscriber for AuditLogWriter {
    fn name(&self) -> &'static str {
        "audit-log"
    }

    async fn on_event(&self, event: &LifecycleEvent) -> Result<(), SubscriberError> {
        self.store
            .add(Self::draft_for(event))
            .await
            .map(|_| ())
            .map_err(|e| SubscriberError::new(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;
    use chrono::Utc;

    use coursekit_core::FixedClock;
    use coursekit_db::MemoryBackend;

    fn store() -> (Arc<MemoryBackend>, AuditLogStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = AuditLogStore::new(
            Arc::clone(&backend) as Arc<dyn StudentLogBackend>,
            Arc::new(FixedClock::at_epoch(1_700_000_000, Utc.fix())),
        );
        (backend, store)
    }

    fn draft(user: &str, course: &str, log_type: &str) -> LogDraft {
        LogDraft {
            user_id: user.into(),
            course_id: course.into(),
            chapter_id: None,
            title: "t".into(),
            content: String::new(),
            log_type: log_type.into(),
            client_ip: None,
        }
    }

    #[tokio::test]
    async fn add_normalizes_unknown_log_types() {
        let (backend, store) = store();
        let id = store.add(draft("u1", "c1", "mystery")).await.unwrap();
        let stored = backend.fetch(id).await.unwrap().unwrap();
        assert_eq!(stored.log_type, "unknown");
    }

    #[tokio::test]
    async fn add_stamps_the_clock_instant() {
        let (backend, store) = store();
        let id = store.add(draft("u1", "c1", "chapter_enter")).await.unwrap();
        let stored = backend.fetch(id).await.unwrap().unwrap();
        assert_eq!(stored.created_at.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn list_results_stay_stale_after_append() {
        let (_backend, store) = store();
        store.add(draft("u1", "c1", "chapter_enter")).await.unwrap();

        let filter = AuditLogFilter {
            course_id: Some("c1".into()),
            ..Default::default()
        };
        assert_eq!(store.get_list(&filter).await.unwrap().len(), 1);

        store.add(draft("u1", "c1", "chapter_finish")).await.unwrap();

        // Same filter, cached result: the append is not visible.
        assert_eq!(store.get_list(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalidation_hook_refreshes_matching_lists() {
        let (_backend, store) = store();
        store.add(draft("u1", "c1", "chapter_enter")).await.unwrap();

        let filter = AuditLogFilter {
            course_id: Some("c1".into()),
            ..Default::default()
        };
        store.get_list(&filter).await.unwrap();
        store.add(draft("u1", "c1", "chapter_finish")).await.unwrap();

        store.invalidate_for("c1", "u1");
        assert_eq!(store.get_list(&filter).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalidation_hook_leaves_unrelated_lists_cached() {
        let (_backend, store) = store();
        store.add(draft("u2", "c2", "chapter_enter")).await.unwrap();

        let unrelated = AuditLogFilter {
            course_id: Some("c2".into()),
            ..Default::default()
        };
        store.get_list(&unrelated).await.unwrap();
        assert_eq!(store.cached_list_count(), 1);

        store.invalidate_for("c1", "u1");
        assert_eq!(store.cached_list_count(), 1);
    }

    #[tokio::test]
    async fn update_invalidates_the_entry_cache() {
        let (_backend, store) = store();
        let id = store.add(draft("u1", "c1", "chapter_enter")).await.unwrap();
        assert_eq!(store.get(id).await.unwrap().unwrap().title, "t");

        store
            .update(
                id,
                &UpdateAuditLogEntry {
                    title: Some("corrected".into()),
                    content: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(store.get(id).await.unwrap().unwrap().title, "corrected");
    }

    #[tokio::test]
    async fn delete_removes_entry_and_cache() {
        let (_backend, store) = store();
        let id = store.add(draft("u1", "c1", "chapter_enter")).await.unwrap();
        store.get(id).await.unwrap();

        assert!(store.delete(id).await.unwrap());
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writer_records_completion_events() {
        let (backend, store) = store();
        let store = Arc::new(store);
        let writer = AuditLogWriter::new(Arc::clone(&store));

        let event = LifecycleEvent::new(
            LifecycleEventKind::CourseCompleted {
                course_id: "c1".into(),
                user_id: "u1".into(),
            },
            Utc::now(),
        )
        .with_client_ip(Some("203.0.113.7".into()));
        writer.on_event(&event).await.unwrap();

        let entries = backend.query(&AuditLogFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].log_type, "course_finish");
        assert_eq!(entries[0].title, "Completed course #c1");
        assert_eq!(entries[0].client_ip.as_deref(), Some("203.0.113.7"));
    }
}
