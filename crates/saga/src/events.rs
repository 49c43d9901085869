//! Saga lifecycle events.

use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};
use events::DomainEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::OrderFulfillmentSaga;
use crate::order_fulfillment::{SAGA_TYPE, SagaStepKind};

/// Events published as a saga moves through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// Phase 1 began.
    SagaStarted(SagaStartedData),

    /// Every step finished.
    SagaCompleted(SagaFinishedData),

    /// A step failed.
    SagaFailed(SagaFailedData),

    /// Compensation finished.
    SagaCompensated(SagaCompensatedData),
}

impl DomainEvent for SagaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "saga.started",
            SagaEvent::SagaCompleted(_) => "saga.completed",
            SagaEvent::SagaFailed(_) => "saga.failed",
            SagaEvent::SagaCompensated(_) => "saga.compensated",
        }
    }

    fn aggregate_type(&self) -> &'static str {
        "OrderFulfillmentSaga"
    }

    fn aggregate_id(&self) -> Uuid {
        let saga_id = match self {
            SagaEvent::SagaStarted(d) => d.saga_id,
            SagaEvent::SagaCompleted(d) => d.saga_id,
            SagaEvent::SagaFailed(d) => d.saga_id,
            SagaEvent::SagaCompensated(d) => d.saga_id,
        };
        saga_id.as_uuid()
    }
}

/// Data for SagaStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    /// The type of saga (e.g., "OrderFulfillment").
    pub saga_type: String,
    pub item_count: usize,
    pub started_at: DateTime<Utc>,
}

/// Data for SagaCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaFinishedData {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub completed_at: DateTime<Utc>,
}

/// Data for SagaFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaFailedData {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    /// The step that failed.
    pub step: SagaStepKind,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Data for SagaCompensated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaCompensatedData {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub released_reservations: usize,
    /// Compensating actions that could not be carried out.
    pub errors: Vec<String>,
    pub compensated_at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    /// Creates a SagaStarted event.
    pub fn saga_started(saga: &OrderFulfillmentSaga) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id: saga.id(),
            order_id: saga.order_id(),
            saga_type: SAGA_TYPE.to_string(),
            item_count: saga.items().len(),
            started_at: Utc::now(),
        })
    }

    /// Creates a SagaCompleted event.
    pub fn saga_completed(saga: &OrderFulfillmentSaga) -> Self {
        SagaEvent::SagaCompleted(SagaFinishedData {
            saga_id: saga.id(),
            order_id: saga.order_id(),
            completed_at: saga.completed_at().unwrap_or_else(Utc::now),
        })
    }

    /// Creates a SagaFailed event.
    pub fn saga_failed(
        saga: &OrderFulfillmentSaga,
        step: SagaStepKind,
        error: impl Into<String>,
    ) -> Self {
        SagaEvent::SagaFailed(SagaFailedData {
            saga_id: saga.id(),
            order_id: saga.order_id(),
            step,
            error: error.into(),
            failed_at: Utc::now(),
        })
    }

    /// Creates a SagaCompensated event.
    pub fn saga_compensated(
        saga: &OrderFulfillmentSaga,
        released_reservations: usize,
        errors: Vec<String>,
    ) -> Self {
        SagaEvent::SagaCompensated(SagaCompensatedData {
            saga_id: saga.id(),
            order_id: saga.order_id(),
            released_reservations,
            errors,
            compensated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CommandContext, CustomerId, ProductId, TenantId, UserId, WarehouseId};
    use inventory::ReservationRequest;

    fn saga() -> OrderFulfillmentSaga {
        OrderFulfillmentSaga::new(
            &CommandContext::new(TenantId::new(), UserId::new()),
            OrderId::new(),
            CustomerId::new(),
            WarehouseId::new(),
            &[ReservationRequest::new(ProductId::new(), 1)],
        )
        .unwrap()
    }

    #[test]
    fn test_event_routing() {
        let saga = saga();
        let started = SagaEvent::saga_started(&saga);
        assert_eq!(started.event_type(), "saga.started");
        assert_eq!(started.aggregate_type(), "OrderFulfillmentSaga");
        assert_eq!(started.aggregate_id(), saga.id().as_uuid());
    }

    #[test]
    fn test_failed_payload_names_step() {
        let saga = saga();
        let event = SagaEvent::saga_failed(&saga, SagaStepKind::ReserveStock, "out of stock");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "SagaFailed");
        assert_eq!(json["data"]["step"], "reserve_stock");
        assert_eq!(json["data"]["error"], "out of stock");
    }
}
