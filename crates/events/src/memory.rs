use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{EventEnvelope, EventError, Result, publisher::EventPublisher};

/// In-memory publisher for tests and single-process wiring.
///
/// Records every published envelope in order. Can be switched into a failing
/// mode to exercise the "publish failures never block the workflow" path.
#[derive(Clone, Default)]
pub struct InMemoryPublisher {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
    fail_on_publish: Arc<AtomicBool>,
}

impl InMemoryPublisher {
    /// Creates a new publisher with no recorded events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to reject every publish call.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns all published envelopes in publish order.
    pub async fn published(&self) -> Vec<EventEnvelope> {
        self.events.read().await.clone()
    }

    /// Returns the total number of events published.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns the published envelopes of one event type.
    pub async fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Clears all recorded events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(EventError::PublishFailed(format!(
                "bus unavailable for {}",
                envelope.event_type
            )));
        }

        self.events.write().await.push(envelope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DomainEvent, EventPublisherExt};
    use common::{CommandContext, TenantId, UserId};
    use serde::Serialize;
    use uuid::Uuid;

    #[derive(Serialize)]
    struct Shipped {
        id: Uuid,
    }

    impl DomainEvent for Shipped {
        fn event_type(&self) -> &'static str {
            "test.shipped"
        }

        fn aggregate_type(&self) -> &'static str {
            "Parcel"
        }

        fn aggregate_id(&self) -> Uuid {
            self.id
        }
    }

    fn ctx() -> CommandContext {
        CommandContext::new(TenantId::new(), UserId::new())
    }

    #[tokio::test]
    async fn test_publish_records_in_order() {
        let publisher = InMemoryPublisher::new();
        let ctx = ctx();

        for _ in 0..3 {
            let event = Shipped { id: Uuid::new_v4() };
            assert!(publisher.publish_best_effort(&ctx, &event).await);
        }

        assert_eq!(publisher.event_count().await, 3);
        assert_eq!(publisher.events_of_type("test.shipped").await.len(), 3);
        assert!(publisher.events_of_type("other").await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_publisher_is_swallowed_by_best_effort() {
        let publisher = InMemoryPublisher::new();
        publisher.set_fail_on_publish(true);

        let event = Shipped { id: Uuid::new_v4() };
        let direct = publisher
            .publish(EventEnvelope::from_event(&ctx(), &event).unwrap())
            .await;
        assert!(matches!(direct, Err(EventError::PublishFailed(_))));

        assert!(!publisher.publish_best_effort(&ctx(), &event).await);
        assert_eq!(publisher.event_count().await, 0);

        publisher.set_fail_on_publish(false);
        assert!(publisher.publish_best_effort(&ctx(), &event).await);
        assert_eq!(publisher.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let publisher = InMemoryPublisher::new();
        publisher
            .publish_best_effort(&ctx(), &Shipped { id: Uuid::new_v4() })
            .await;
        publisher.clear().await;
        assert_eq!(publisher.event_count().await, 0);
    }
}
