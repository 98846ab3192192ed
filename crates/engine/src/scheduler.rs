//! Email send-time scheduling.
//!
//! The scheduler subscribes to lifecycle events, matches them against
//! the active notification rules, and enqueues one send decision per
//! matching rule with a deterministically computed send timestamp.
//! Actual delivery belongs to whatever drains the queue.

use std::sync::Arc;

use async_trait::async_trait;

use coursekit_core::trigger::{can_trigger, compute_send_timestamp};
use coursekit_core::{Clock, LifecycleEvent};
use coursekit_db::models::{NewScheduledEmail, ScheduledEmail};
use coursekit_db::{EmailQueueBackend, EmailRuleBackend};
use coursekit_events::{LifecycleSubscriber, SubscriberError};

use crate::error::EngineError;

pub struct EmailScheduler {
    rules: Arc<dyn EmailRuleBackend>,
    queue: Arc<dyn EmailQueueBackend>,
    clock: Arc<dyn Clock>,
}

impl EmailScheduler {
    pub fn new(
        rules: Arc<dyn EmailRuleBackend>,
        queue: Arc<dyn EmailQueueBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rules,
            queue,
            clock,
        }
    }

    /// Evaluate every active rule against `event` and enqueue the
    /// matches. Returns what was enqueued.
    pub async fn evaluate(&self, event: &LifecycleEvent) -> Result<Vec<ScheduledEmail>, EngineError> {
        let course_id = event.kind.course_id();
        let user_id = event.kind.user_id();
        let now = self.clock.now().timestamp();
        let offset = self.clock.local_offset();

        let mut scheduled = Vec::new();
        for rule in self.rules.list_active().await? {
            let Some(condition) = rule.trigger.as_ref() else {
                continue;
            };
            if !condition.trigger_at.matches(&event.kind) {
                continue;
            }
            if !can_trigger(&rule, user_id, course_id) {
                continue;
            }
            let Some(send_at) = compute_send_timestamp(&rule, now, offset) else {
                continue;
            };

            let item = NewScheduledEmail {
                rule_id: rule.id,
                user_id: user_id.clone(),
                course_id: course_id.clone(),
                send_at,
            };
            let stored = self.queue.enqueue(&item).await?;
            tracing::debug!(
                rule_id = rule.id,
                send_at,
                event_type = event.kind.event_type(),
                "Scheduled notification email"
            );
            scheduled.push(stored);
        }
        Ok(scheduled)
    }
}

#[async_trait]
impl LifecycleSubscriber for EmailScheduler {
    fn name(&self) -> &'static str {
        "email-scheduler"
    }

    async fn on_event(&self, event: &LifecycleEvent) -> Result<(), SubscriberError> {
        self.evaluate(event)
            .await
            .map(|_| ())
            .map_err(|e| SubscriberError::new(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
