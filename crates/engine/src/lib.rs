//! Stateful engine services: the cached grant store, the chapter
//! lifecycle operations, the audit log, and the email scheduler, plus
//! the wiring that connects them through the event bus.

pub mod access;
pub mod audit;
pub mod error;
pub mod progress;
pub mod scheduler;

use std::sync::Arc;

use coursekit_core::{Clock, CourseStructureProvider};
use coursekit_db::{
    AccessGrantBackend, EmailQueueBackend, EmailRuleBackend, StudentLogBackend,
};
use coursekit_events::{LifecycleEventBus, LifecycleSubscriber};

pub use access::AccessRecordStore;
pub use audit::{AuditLogStore, AuditLogWriter, LogDraft};
pub use error::EngineError;
pub use progress::{ChapterProgressEngine, ToggleOutcome};
pub use scheduler::EmailScheduler;

/// Fully wired engine: one of everything, sharing a single backend and
/// clock. The bus carries the audit writer and the email scheduler, in
/// that order.
pub struct Platform {
    pub access: Arc<AccessRecordStore>,
    pub progress: Arc<ChapterProgressEngine>,
    pub audit: Arc<AuditLogStore>,
    pub scheduler: Arc<EmailScheduler>,
    pub bus: Arc<LifecycleEventBus>,
}

impl Platform {
    pub fn new<B>(
        backend: Arc<B>,
        courses: Arc<dyn CourseStructureProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        B: AccessGrantBackend
            + StudentLogBackend
            + EmailRuleBackend
            + EmailQueueBackend
            + 'static,
    {
        let access = Arc::new(AccessRecordStore::new(
            Arc::clone(&backend) as Arc<dyn AccessGrantBackend>
        ));
        let audit = Arc::new(AuditLogStore::new(
            Arc::clone(&backend) as Arc<dyn StudentLogBackend>,
            Arc::clone(&clock),
        ));
        let scheduler = Arc::new(EmailScheduler::new(
            Arc::clone(&backend) as Arc<dyn EmailRuleBackend>,
            backend as Arc<dyn EmailQueueBackend>,
            Arc::clone(&clock),
        ));

        let mut bus = LifecycleEventBus::new();
        bus.register(Arc::new(AuditLogWriter::new(Arc::clone(&audit))) as Arc<dyn LifecycleSubscriber>);
        bus.register(Arc::clone(&scheduler) as Arc<dyn LifecycleSubscriber>);
        let bus = Arc::new(bus);

        let progress = Arc::new(ChapterProgressEngine::new(
            Arc::clone(&access),
            Arc::clone(&bus),
            courses,
            clock,
        ));

        Self {
            access,
            progress,
            audit,
            scheduler,
            bus,
        }
    }

    /// Manual invalidation hook for out-of-band writes (imports,
    /// admin edits): drops the cached grant and every cached audit list
    /// referencing the pair.
    pub fn invalidate_user_course(&self, course_id: &str, user_id: &str) {
        self.access
            .invalidate(&coursekit_core::GrantKey::new(course_id, user_id));
        self.audit.invalidate_for(course_id, user_id);
    }
}
