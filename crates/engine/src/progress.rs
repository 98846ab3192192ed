//! Chapter lifecycle operations: enter and toggle-finished.
//!
//! State is committed through the [`AccessRecordStore`] before any event
//! is published, so subscribers always observe storage that already
//! reflects the transition they are reacting to. Subscriber failures are
//! reported but never roll the transition back.

use std::collections::BTreeSet;
use std::sync::Arc;

use coursekit_core::types::{ChapterId, CourseId, GrantKey, RequestContext, UserId};
use coursekit_core::{
    progress, Clock, CourseStructureProvider, LifecycleEvent, LifecycleEventKind,
};
use coursekit_events::{DispatchReport, LifecycleEventBus};

use crate::access::AccessRecordStore;
use crate::error::EngineError;

/// Result of a toggle operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleOutcome {
    /// Finished state of the chapter after the toggle.
    pub finished: bool,

    /// Completion percentage of the course after the toggle, 0..=100.
    pub progress: f64,
}

pub struct ChapterProgressEngine {
    store: Arc<AccessRecordStore>,
    bus: Arc<LifecycleEventBus>,
    courses: Arc<dyn CourseStructureProvider>,
    clock: Arc<dyn Clock>,
}

impl ChapterProgressEngine {
    pub fn new(
        store: Arc<AccessRecordStore>,
        bus: Arc<LifecycleEventBus>,
        courses: Arc<dyn CourseStructureProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            bus,
            courses,
            clock,
        }
    }

    /// Record that the learner opened a chapter.
    ///
    /// The last-visit pointer moves on every call; the first-visit time
    /// and the `chapter.entered` event fire only on the first call per
    /// chapter.
    pub async fn enter_chapter(
        &self,
        course_id: &CourseId,
        chapter_id: &ChapterId,
        ctx: &RequestContext,
    ) -> Result<(), EngineError> {
        let user_id = acting_user(ctx)?;
        let key = GrantKey::new(course_id.clone(), user_id.clone());
        let now = self.clock.now();

        let first_visit = self.store.record_first_visit(&key, chapter_id, now).await?;
        self.store.update_last_visit(&key, chapter_id, now).await?;

        if first_visit {
            let event = LifecycleEvent::new(
                LifecycleEventKind::ChapterEntered {
                    chapter_id: chapter_id.clone(),
                    course_id: course_id.clone(),
                    user_id,
                },
                now,
            )
            .with_client_ip(ctx.client_ip.clone());
            self.bus.publish(&event).await;
        }
        Ok(())
    }

    /// Flip the finished state of a leaf chapter and re-evaluate course
    /// completion.
    pub async fn toggle_chapter_finished(
        &self,
        course_id: &CourseId,
        chapter_id: &ChapterId,
        ctx: &RequestContext,
    ) -> Result<ToggleOutcome, EngineError> {
        let leaves = self.courses.leaf_chapter_ids(course_id).await?;
        self.toggle_with_leaves(course_id, chapter_id, ctx, &leaves)
            .await
    }

    /// Toggle against an already-resolved leaf set. Used by callers that
    /// batch-resolve course structure.
    pub async fn toggle_with_leaves(
        &self,
        course_id: &CourseId,
        chapter_id: &ChapterId,
        ctx: &RequestContext,
        leaves: &BTreeSet<ChapterId>,
    ) -> Result<ToggleOutcome, EngineError> {
        // A course with no leaves rejects every toggle, including ids it
        // could never contain.
        if !leaves.contains(chapter_id) {
            return Err(EngineError::validation(format!(
                "chapter {chapter_id} is not a leaf of course {course_id}"
            )));
        }

        let user_id = acting_user(ctx)?;
        let key = GrantKey::new(course_id.clone(), user_id.clone());
        let now = self.clock.now();

        let (finished, grant) = self.store.toggle_finished(&key, chapter_id).await?;
        let progress = progress::percentage(&grant.finished_chapter_ids, leaves);

        let kind = if finished {
            LifecycleEventKind::ChapterFinished {
                chapter_id: chapter_id.clone(),
                course_id: course_id.clone(),
                user_id: user_id.clone(),
            }
        } else {
            LifecycleEventKind::ChapterUnfinished {
                chapter_id: chapter_id.clone(),
                course_id: course_id.clone(),
                user_id: user_id.clone(),
            }
        };
        self.publish(LifecycleEvent::new(kind, now).with_client_ip(ctx.client_ip.clone()))
            .await;

        if finished
            && progress::is_complete(&grant.finished_chapter_ids, leaves)
            && !grant.already_completed
        {
            // Latch the flag before announcing, so a crash between the
            // two suppresses the event rather than duplicating it.
            if self.store.mark_completed_once(&key).await? {
                let completed = LifecycleEvent::new(
                    LifecycleEventKind::CourseCompleted {
                        course_id: course_id.clone(),
                        user_id,
                    },
                    now,
                )
                .with_client_ip(ctx.client_ip.clone());
                self.publish(completed).await;
            }
        }

        Ok(ToggleOutcome { finished, progress })
    }

    async fn publish(&self, event: LifecycleEvent) -> DispatchReport {
        let report = self.bus.publish(&event).await;
        if !report.is_clean() {
            tracing::warn!(
                event_type = event.kind.event_type(),
                failures = report.failures.len(),
                "Event dispatched with subscriber failures"
            );
        }
        report
    }
}

fn acting_user(ctx: &RequestContext) -> Result<UserId, EngineError> {
    ctx.user_id
        .clone()
        .ok_or_else(|| EngineError::validation("operation requires an acting user"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::Offset;
    use chrono::Utc;

    use coursekit_core::grant::{AccessGrant, ExpiryDescriptor};
    use coursekit_core::{CoreError, FixedClock};
    use coursekit_db::{AccessGrantBackend, MemoryBackend};
    use coursekit_events::{LifecycleSubscriber, SubscriberError};

    struct FixedStructure {
        leaves: BTreeSet<ChapterId>,
    }

    #[async_trait]
    impl CourseStructureProvider for FixedStructure {
        async fn leaf_chapter_ids(
            &self,
            _course_id: &CourseId,
        ) -> Result<BTreeSet<ChapterId>, CoreError> {
            Ok(self.leaves.clone())
        }
    }

    struct EventSink {
        seen: Mutex<Vec<LifecycleEvent>>,
    }

    #[async_trait]
    impl LifecycleSubscriber for EventSink {
        fn name(&self) -> &'static str {
            "event-sink"
        }

        async fn on_event(&self, event: &LifecycleEvent) -> Result<(), SubscriberError> {
            self.seen.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn leaves(ids: &[&str]) -> BTreeSet<ChapterId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn engine_with(leaf_ids: &[&str]) -> (ChapterProgressEngine, Arc<EventSink>) {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_grant(AccessGrant::new("c1", "u1", ExpiryDescriptor::unlimited()));
        let store = Arc::new(AccessRecordStore::new(
            Arc::clone(&backend) as Arc<dyn AccessGrantBackend>
        ));

        let sink = Arc::new(EventSink {
            seen: Mutex::new(Vec::new()),
        });
        let mut bus = LifecycleEventBus::new();
        bus.register(Arc::clone(&sink) as Arc<dyn LifecycleSubscriber>);

        let engine = ChapterProgressEngine::new(
            store,
            Arc::new(bus),
            Arc::new(FixedStructure {
                leaves: leaves(leaf_ids),
            }),
            Arc::new(FixedClock::at_epoch(1_700_000_000, Utc.fix())),
        );
        (engine, sink)
    }

    fn event_types(sink: &EventSink) -> Vec<&'static str> {
        sink.seen
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.kind.event_type())
            .collect()
    }

    #[tokio::test]
    async fn entering_twice_emits_one_entered_event() {
        let (engine, sink) = engine_with(&["ch1"]);
        let ctx = RequestContext::for_user("u1");

        engine
            .enter_chapter(&"c1".into(), &"ch1".into(), &ctx)
            .await
            .unwrap();
        engine
            .enter_chapter(&"c1".into(), &"ch1".into(), &ctx)
            .await
            .unwrap();

        assert_eq!(event_types(&sink), vec!["chapter.entered"]);
    }

    #[tokio::test]
    async fn toggle_rejects_non_leaf_without_mutating() {
        let (engine, sink) = engine_with(&["ch1"]);
        let ctx = RequestContext::for_user("u1");

        let result = engine
            .toggle_chapter_finished(&"c1".into(), &"ch2".into(), &ctx)
            .await;
        assert_matches!(
            result,
            Err(EngineError::Core(CoreError::Validation(_)))
        );
        assert!(event_types(&sink).is_empty());
    }

    #[tokio::test]
    async fn course_with_no_leaves_rejects_every_toggle() {
        let (engine, _sink) = engine_with(&[]);
        let ctx = RequestContext::for_user("u1");

        let result = engine
            .toggle_chapter_finished(&"c1".into(), &"ch1".into(), &ctx)
            .await;
        assert_matches!(result, Err(EngineError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn missing_user_is_a_validation_error() {
        let (engine, _sink) = engine_with(&["ch1"]);
        let result = engine
            .toggle_chapter_finished(&"c1".into(), &"ch1".into(), &RequestContext::default())
            .await;
        assert_matches!(result, Err(EngineError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn partial_progress_emits_finished_only() {
        let (engine, sink) = engine_with(&["ch1", "ch2", "ch3", "ch4", "ch5"]);
        let ctx = RequestContext::for_user("u1");

        let outcome = engine
            .toggle_chapter_finished(&"c1".into(), &"ch1".into(), &ctx)
            .await
            .unwrap();
        assert!(outcome.finished);
        assert_eq!(outcome.progress, 20.0);
        assert_eq!(event_types(&sink), vec!["chapter.finished"]);
    }

    #[tokio::test]
    async fn completing_the_last_chapter_emits_course_completed_once() {
        let (engine, sink) = engine_with(&["ch1", "ch2", "ch3", "ch4", "ch5"]);
        let ctx = RequestContext::for_user("u1");

        for chapter in ["ch1", "ch2", "ch3", "ch4"] {
            let outcome = engine
                .toggle_chapter_finished(&"c1".into(), &chapter.into(), &ctx)
                .await
                .unwrap();
            assert!(outcome.progress < 100.0);
        }
        assert_eq!(sink.seen.lock().unwrap().len(), 4);

        let outcome = engine
            .toggle_chapter_finished(&"c1".into(), &"ch5".into(), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.progress, 100.0);

        let types = event_types(&sink);
        assert_eq!(types[4], "chapter.finished");
        assert_eq!(types[5], "course.completed");

        // Un-finish and re-finish: milestone does not fire again.
        engine
            .toggle_chapter_finished(&"c1".into(), &"ch5".into(), &ctx)
            .await
            .unwrap();
        engine
            .toggle_chapter_finished(&"c1".into(), &"ch5".into(), &ctx)
            .await
            .unwrap();

        let completions = event_types(&sink)
            .iter()
            .filter(|t| **t == "course.completed")
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn completion_event_carries_the_clock_instant() {
        let (engine, sink) = engine_with(&["ch1"]);
        let ctx = RequestContext::for_user("u1").with_client_ip("203.0.113.7");

        engine
            .toggle_chapter_finished(&"c1".into(), &"ch1".into(), &ctx)
            .await
            .unwrap();

        let seen = sink.seen.lock().unwrap();
        let completed = seen
            .iter()
            .find(|e| e.kind.event_type() == "course.completed")
            .unwrap();
        assert_eq!(completed.at.timestamp(), 1_700_000_000);
        assert_eq!(completed.client_ip.as_deref(), Some("203.0.113.7"));
    }
}
