use async_trait::async_trait;
use common::CommandContext;

use crate::{DomainEvent, EventEnvelope, Result};

/// Boundary to the message bus.
///
/// Implementations deliver envelopes at least once. The fulfillment core never
/// waits on or retries a publish; see [`EventPublisherExt::publish_best_effort`].
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes a single event envelope.
    async fn publish(&self, envelope: EventEnvelope) -> Result<()>;
}

/// Extension trait providing convenience methods for publishers.
#[async_trait]
pub trait EventPublisherExt: EventPublisher {
    /// Wraps and publishes a domain event, logging instead of failing.
    ///
    /// Returns `true` if the event was handed to the bus.
    async fn publish_best_effort<E>(&self, ctx: &CommandContext, event: &E) -> bool
    where
        E: DomainEvent,
    {
        let event_type = event.event_type();
        let envelope = match EventEnvelope::from_event(ctx, event) {
            Ok(envelope) => envelope,
            Err(e) => {
                metrics::counter!("events_publish_failures_total", "event_type" => event_type)
                    .increment(1);
                tracing::warn!(event_type, error = %e, "failed to build event envelope");
                return false;
            }
        };

        match self.publish(envelope).await {
            Ok(()) => {
                tracing::debug!(event_type, correlation_id = %ctx.correlation_id, "event published");
                true
            }
            Err(e) => {
                metrics::counter!("events_publish_failures_total", "event_type" => event_type)
                    .increment(1);
                tracing::warn!(
                    event_type,
                    correlation_id = %ctx.correlation_id,
                    error = %e,
                    "failed to publish event"
                );
                false
            }
        }
    }
}

// Blanket implementation for all EventPublisher implementations
impl<T: EventPublisher + ?Sized> EventPublisherExt for T {}
