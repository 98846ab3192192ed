//! Synchronous, ordered event fan-out with per-subscriber failure
//! isolation.
//!
//! A subscriber failure never stops delivery to the remaining
//! subscribers and never rolls back the state change that triggered the
//! event — the publisher gets an aggregated [`DispatchReport`] after all
//! subscribers have run.

use std::sync::Arc;

use async_trait::async_trait;

use coursekit_core::LifecycleEvent;

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// Failure raised by a single subscriber during dispatch.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

impl SubscriberError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A typed consumer of lifecycle events.
///
/// `on_event` runs inside the publishing call; long-running work belongs
/// elsewhere.
#[async_trait]
pub trait LifecycleSubscriber: Send + Sync {
    /// Stable name used in dispatch reports and logs.
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: &LifecycleEvent) -> Result<(), SubscriberError>;
}

// ---------------------------------------------------------------------------
// DispatchReport
// ---------------------------------------------------------------------------

/// One subscriber's failure, captured during dispatch.
#[derive(Debug)]
pub struct DispatchFailure {
    pub subscriber: &'static str,
    pub error: SubscriberError,
}

/// Aggregated outcome of one publish call.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of subscribers that received the event (failed ones
    /// included — delivery was attempted for all of them).
    pub delivered: usize,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// LifecycleEventBus
// ---------------------------------------------------------------------------

/// In-process fan-out hub. Subscribers are registered once at wiring
/// time and invoked in registration order on every publish.
#[derive(Default)]
pub struct LifecycleEventBus {
    subscribers: Vec<Arc<dyn LifecycleSubscriber>>,
}

impl LifecycleEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber. Order of registration is order of delivery.
    pub fn register(&mut self, subscriber: Arc<dyn LifecycleSubscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Deliver `event` to every subscriber, in order, within this call.
    ///
    /// Failures are captured per subscriber and reported after all
    /// subscribers have run; they are also logged here so callers that
    /// ignore the report still leave a trace.
    pub async fn publish(&self, event: &LifecycleEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for subscriber in &self.subscribers {
            report.delivered += 1;
            if let Err(error) = subscriber.on_event(event).await {
                tracing::error!(
                    subscriber = subscriber.name(),
                    event_type = event.kind.event_type(),
                    error = %error,
                    "Subscriber failed during event dispatch"
                );
                report.failures.push(DispatchFailure {
                    subscriber: subscriber.name(),
                    error,
                });
            }
        }

        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use coursekit_core::LifecycleEventKind;

    fn event() -> LifecycleEvent {
        LifecycleEvent::new(
            LifecycleEventKind::CourseCompleted {
                course_id: "c".into(),
                user_id: "u".into(),
            },
            Utc::now(),
        )
    }

    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl LifecycleSubscriber for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn on_event(&self, _event: &LifecycleEvent) -> Result<(), SubscriberError> {
            self.seen.lock().unwrap().push(self.name);
            if self.fail {
                Err(SubscriberError::new("boom"))
            } else {
                Ok(())
            }
        }
    }

    fn recorder(
        name: &'static str,
        seen: &Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    ) -> Arc<dyn LifecycleSubscriber> {
        Arc::new(Recorder {
            name,
            seen: Arc::clone(seen),
            fail,
        })
    }

    #[tokio::test]
    async fn delivers_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = LifecycleEventBus::new();
        bus.register(recorder("first", &seen, false));
        bus.register(recorder("second", &seen, false));
        bus.register(recorder("third", &seen, false));

        let report = bus.publish(&event()).await;

        assert!(report.is_clean());
        assert_eq!(report.delivered, 3);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_stop_delivery() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = LifecycleEventBus::new();
        bus.register(recorder("ok-1", &seen, false));
        bus.register(recorder("broken", &seen, true));
        bus.register(recorder("ok-2", &seen, false));

        let report = bus.publish(&event()).await;

        assert_eq!(*seen.lock().unwrap(), vec!["ok-1", "broken", "ok-2"]);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].subscriber, "broken");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_clean() {
        let bus = LifecycleEventBus::new();
        let report = bus.publish(&event()).await;
        assert!(report.is_clean());
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn republishing_duplicates_downstream_effects() {
        // No deduplication by design.
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = LifecycleEventBus::new();
        bus.register(recorder("only", &seen, false));

        let e = event();
        bus.publish(&e).await;
        bus.publish(&e).await;

        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
