//! Cache-coherent access-record store.
//!
//! All grant reads and writes in the engine go through
//! [`AccessRecordStore`]. Reads are served from a per-process cache with
//! no TTL; every mutation commits to the backend first and only then
//! drops the cached copy, so a successful write is never shadowed by a
//! stale read and a failed write leaves the cache untouched.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use coursekit_core::grant::{AccessGrant, LastVisit};
use coursekit_core::types::{ChapterId, GrantKey, Timestamp};
use coursekit_core::CoreError;
use coursekit_db::AccessGrantBackend;

use crate::error::EngineError;

pub struct AccessRecordStore {
    backend: Arc<dyn AccessGrantBackend>,
    cache: RwLock<HashMap<GrantKey, AccessGrant>>,
}

impl AccessRecordStore {
    pub fn new(backend: Arc<dyn AccessGrantBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Read-through lookup. Missing grants are not negatively cached.
    pub async fn get(&self, key: &GrantKey) -> Result<Option<AccessGrant>, EngineError> {
        if let Some(grant) = self.read_cache().get(key).cloned() {
            return Ok(Some(grant));
        }
        let fetched = self.backend.fetch(key).await?;
        if let Some(grant) = &fetched {
            self.write_cache().insert(key.clone(), grant.clone());
        }
        Ok(fetched)
    }

    /// Flip the finished state of `chapter_id` on the grant and commit.
    ///
    /// Returns the new finished state and the committed grant.
    pub async fn toggle_finished(
        &self,
        key: &GrantKey,
        chapter_id: &ChapterId,
    ) -> Result<(bool, AccessGrant), EngineError> {
        let mut grant = self.require(key).await?;
        let now_finished = if grant.finished_chapter_ids.contains(chapter_id) {
            grant.finished_chapter_ids.remove(chapter_id);
            false
        } else {
            grant.finished_chapter_ids.insert(chapter_id.clone());
            true
        };
        self.commit(key, &grant).await?;
        Ok((now_finished, grant))
    }

    /// Record the most recently opened chapter. Overwrites on every call.
    pub async fn update_last_visit(
        &self,
        key: &GrantKey,
        chapter_id: &ChapterId,
        at: Timestamp,
    ) -> Result<(), EngineError> {
        let mut grant = self.require(key).await?;
        grant.last_visit = Some(LastVisit {
            chapter_id: chapter_id.clone(),
            at,
        });
        self.commit(key, &grant).await
    }

    /// Record the first visit to `chapter_id` if none is recorded yet.
    ///
    /// Returns whether this call was the first visit. Repeat visits are
    /// a no-op: no write, no cache churn.
    pub async fn record_first_visit(
        &self,
        key: &GrantKey,
        chapter_id: &ChapterId,
        at: Timestamp,
    ) -> Result<bool, EngineError> {
        let mut grant = self.require(key).await?;
        if grant.first_visit_times.contains_key(chapter_id) {
            return Ok(false);
        }
        grant.first_visit_times.insert(chapter_id.clone(), at);
        self.commit(key, &grant).await?;
        Ok(true)
    }

    /// Latch the completion flag. Returns whether this call flipped it;
    /// once set the flag stays set and repeat calls do not write.
    pub async fn mark_completed_once(&self, key: &GrantKey) -> Result<bool, EngineError> {
        let mut grant = self.require(key).await?;
        if grant.already_completed {
            return Ok(false);
        }
        grant.already_completed = true;
        self.commit(key, &grant).await?;
        Ok(true)
    }

    /// Drop the cached copy for `key`. Next read goes to the backend.
    pub fn invalidate(&self, key: &GrantKey) {
        self.write_cache().remove(key);
    }

    /// Whether `key` currently has a cached copy. Observability helper.
    pub fn is_cached(&self, key: &GrantKey) -> bool {
        self.read_cache().contains_key(key)
    }

    async fn require(&self, key: &GrantKey) -> Result<AccessGrant, EngineError> {
        self.get(key).await?.ok_or_else(|| {
            EngineError::Core(CoreError::NotFound {
                entity: "access grant",
                id: format!("{}/{}", key.course_id, key.user_id),
            })
        })
    }

    // Commit order is fixed: backend write, then cache invalidation.
    async fn commit(&self, key: &GrantKey, grant: &AccessGrant) -> Result<(), EngineError> {
        self.backend.upsert(grant).await?;
        self.invalidate(key);
        Ok(())
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<GrantKey, AccessGrant>> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<GrantKey, AccessGrant>> {
        self.cache.write().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    use coursekit_core::grant::ExpiryDescriptor;
    use coursekit_db::MemoryBackend;

    fn store_with_grant() -> (Arc<MemoryBackend>, AccessRecordStore, GrantKey) {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_grant(AccessGrant::new("c1", "u1", ExpiryDescriptor::unlimited()));
        let store = AccessRecordStore::new(Arc::clone(&backend) as Arc<dyn AccessGrantBackend>);
        (backend, store, GrantKey::new("c1", "u1"))
    }

    #[tokio::test]
    async fn get_populates_the_cache() {
        let (_backend, store, key) = store_with_grant();
        assert!(!store.is_cached(&key));
        store.get(&key).await.unwrap().unwrap();
        assert!(store.is_cached(&key));
    }

    #[tokio::test]
    async fn missing_grant_is_not_negatively_cached() {
        let (backend, store, _key) = store_with_grant();
        let missing = GrantKey::new("c1", "nobody");
        assert!(store.get(&missing).await.unwrap().is_none());
        assert!(!store.is_cached(&missing));

        // A grant appearing later is visible immediately.
        backend.seed_grant(AccessGrant::new(
            "c1",
            "nobody",
            ExpiryDescriptor::unlimited(),
        ));
        assert!(store.get(&missing).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn toggle_is_involutive() {
        let (_backend, store, key) = store_with_grant();
        let chapter: ChapterId = "ch1".into();

        let (finished, _) = store.toggle_finished(&key, &chapter).await.unwrap();
        assert!(finished);
        let (finished, grant) = store.toggle_finished(&key, &chapter).await.unwrap();
        assert!(!finished);
        assert!(grant.finished_chapter_ids.is_empty());
    }

    #[tokio::test]
    async fn mutation_invalidates_the_cached_copy() {
        let (_backend, store, key) = store_with_grant();
        store.get(&key).await.unwrap();
        assert!(store.is_cached(&key));

        store.toggle_finished(&key, &"ch1".into()).await.unwrap();
        assert!(!store.is_cached(&key));

        // Next read sees the committed state.
        let grant = store.get(&key).await.unwrap().unwrap();
        assert!(grant.finished_chapter_ids.contains("ch1"));
    }

    #[tokio::test]
    async fn failed_write_keeps_cache_and_backend_intact() {
        let (backend, store, key) = store_with_grant();
        store.get(&key).await.unwrap();
        backend.fail_writes(true);

        let result = store.toggle_finished(&key, &"ch1".into()).await;
        assert_matches!(result, Err(EngineError::Storage(_)));

        // Cached copy survives a failed commit and still reflects the
        // last committed state.
        assert!(store.is_cached(&key));
        let grant = store.get(&key).await.unwrap().unwrap();
        assert!(grant.finished_chapter_ids.is_empty());
    }

    #[tokio::test]
    async fn first_visit_is_recorded_once() {
        let (_backend, store, key) = store_with_grant();
        let chapter: ChapterId = "ch1".into();
        let t1 = Utc::now();

        assert!(store.record_first_visit(&key, &chapter, t1).await.unwrap());
        assert!(!store.record_first_visit(&key, &chapter, Utc::now()).await.unwrap());

        let grant = store.get(&key).await.unwrap().unwrap();
        assert_eq!(grant.first_visit_times.get(&chapter), Some(&t1));
    }

    #[tokio::test]
    async fn completion_flag_latches() {
        let (_backend, store, key) = store_with_grant();
        assert!(store.mark_completed_once(&key).await.unwrap());
        assert!(!store.mark_completed_once(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().unwrap().already_completed);
    }

    #[tokio::test]
    async fn operations_on_missing_grant_report_not_found() {
        let (_backend, store, _key) = store_with_grant();
        let missing = GrantKey::new("c9", "u9");
        let result = store.toggle_finished(&missing, &"ch1".into()).await;
        assert_matches!(
            result,
            Err(EngineError::Core(CoreError::NotFound { entity: "access grant", .. }))
        );
    }
}
