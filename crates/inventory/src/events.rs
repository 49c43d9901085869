//! Inventory domain events.

use chrono::{DateTime, Utc};
use common::{OperationId, ProductId, ReservationId, WarehouseId};
use events::DomainEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::InventoryItem;
use crate::money::Money;
use crate::operation::{OperationType, WarehouseOperation};
use crate::reservation::{Reference, StockReservation};

/// Events emitted by the inventory layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InventoryEvent {
    /// Stock was reserved.
    StockReserved(ReservationData),

    /// A reservation was given back.
    ReservationReleased(ReservationReleasedData),

    /// A reservation was converted into a permanent deduction.
    ReservationCommitted(ReservationData),

    /// A reservation lapsed.
    ReservationExpired(ReservationData),

    /// A warehouse task was created.
    OperationCreated(OperationData),

    /// A warehouse task was completed.
    OperationCompleted(OperationData),

    /// A warehouse task was cancelled.
    OperationCancelled(OperationCancelledData),

    /// Goods left the warehouse.
    InventoryShipped(InventoryShippedData),

    /// Goods were received.
    InventoryReceived(InventoryReceivedData),

    /// On-hand stock was corrected manually or by a count.
    InventoryAdjusted(InventoryAdjustedData),
}

impl DomainEvent for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockReserved(_) => "stock.reserved",
            InventoryEvent::ReservationReleased(_) => "reservation.released",
            InventoryEvent::ReservationCommitted(_) => "reservation.committed",
            InventoryEvent::ReservationExpired(_) => "reservation.expired",
            InventoryEvent::OperationCreated(_) => "warehouse.operation.created",
            InventoryEvent::OperationCompleted(_) => "warehouse.operation.completed",
            InventoryEvent::OperationCancelled(_) => "warehouse.operation.cancelled",
            InventoryEvent::InventoryShipped(_) => "inventory.shipped",
            InventoryEvent::InventoryReceived(_) => "inventory.received",
            InventoryEvent::InventoryAdjusted(_) => "inventory.adjusted",
        }
    }

    fn aggregate_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockReserved(_)
            | InventoryEvent::ReservationReleased(_)
            | InventoryEvent::ReservationCommitted(_)
            | InventoryEvent::ReservationExpired(_) => "StockReservation",
            InventoryEvent::OperationCreated(_)
            | InventoryEvent::OperationCompleted(_)
            | InventoryEvent::OperationCancelled(_) => "WarehouseOperation",
            InventoryEvent::InventoryShipped(_)
            | InventoryEvent::InventoryReceived(_)
            | InventoryEvent::InventoryAdjusted(_) => "InventoryItem",
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            InventoryEvent::StockReserved(d)
            | InventoryEvent::ReservationCommitted(d)
            | InventoryEvent::ReservationExpired(d) => d.reservation_id.as_uuid(),
            InventoryEvent::ReservationReleased(d) => d.reservation_id.as_uuid(),
            InventoryEvent::OperationCreated(d) | InventoryEvent::OperationCompleted(d) => {
                d.operation_id.as_uuid()
            }
            InventoryEvent::OperationCancelled(d) => d.operation_id.as_uuid(),
            InventoryEvent::InventoryShipped(d) => d.product_id.as_uuid(),
            InventoryEvent::InventoryReceived(d) => d.product_id.as_uuid(),
            InventoryEvent::InventoryAdjusted(d) => d.product_id.as_uuid(),
        }
    }
}

/// Data shared by the reservation lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationData {
    pub reservation_id: ReservationId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub reference: Reference,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Data for ReservationReleased event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationReleasedData {
    pub reservation_id: ReservationId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub reference: Reference,
    pub quantity: u32,

    /// Why the hold was given back, e.g. "saga_compensation".
    pub reason: String,

    pub released_at: DateTime<Utc>,
}

/// Data for warehouse task events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationData {
    pub operation_id: OperationId,
    pub warehouse_id: WarehouseId,
    pub operation_type: OperationType,
    pub reference: Option<Reference>,
    pub item_count: usize,
    pub priority: u8,
    pub occurred_at: DateTime<Utc>,
}

/// Data for OperationCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationCancelledData {
    pub operation_id: OperationId,
    pub warehouse_id: WarehouseId,
    pub operation_type: OperationType,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

/// Data for InventoryShipped event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryShippedData {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: u32,
    pub reference: Reference,

    /// The ship task that moved the goods.
    pub operation_id: OperationId,

    pub shipped_at: DateTime<Utc>,
}

/// Data for InventoryReceived event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReceivedData {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: u32,
    pub unit_cost: Money,

    /// On-hand quantity after the receipt.
    pub on_hand: u32,

    pub received_at: DateTime<Utc>,
}

/// Data for InventoryAdjusted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryAdjustedData {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,

    /// Signed change to the on-hand quantity.
    pub delta: i64,

    pub reason: String,

    /// On-hand quantity after the correction.
    pub on_hand: u32,

    pub adjusted_at: DateTime<Utc>,
}

// Convenience constructors for events
impl InventoryEvent {
    fn reservation_data(reservation: &StockReservation) -> ReservationData {
        ReservationData {
            reservation_id: reservation.id(),
            product_id: reservation.product_id(),
            warehouse_id: reservation.warehouse_id(),
            reference: reservation.reference().clone(),
            quantity: reservation.quantity(),
            occurred_at: Utc::now(),
        }
    }

    fn operation_data(operation: &WarehouseOperation) -> OperationData {
        OperationData {
            operation_id: operation.id(),
            warehouse_id: operation.warehouse_id(),
            operation_type: operation.operation_type(),
            reference: operation.reference().cloned(),
            item_count: operation.items().len(),
            priority: operation.priority(),
            occurred_at: Utc::now(),
        }
    }

    /// Creates a StockReserved event.
    pub fn stock_reserved(reservation: &StockReservation) -> Self {
        InventoryEvent::StockReserved(Self::reservation_data(reservation))
    }

    /// Creates a ReservationReleased event.
    pub fn reservation_released(reservation: &StockReservation, reason: impl Into<String>) -> Self {
        InventoryEvent::ReservationReleased(ReservationReleasedData {
            reservation_id: reservation.id(),
            product_id: reservation.product_id(),
            warehouse_id: reservation.warehouse_id(),
            reference: reservation.reference().clone(),
            quantity: reservation.quantity(),
            reason: reason.into(),
            released_at: Utc::now(),
        })
    }

    /// Creates a ReservationCommitted event.
    pub fn reservation_committed(reservation: &StockReservation) -> Self {
        InventoryEvent::ReservationCommitted(Self::reservation_data(reservation))
    }

    /// Creates a ReservationExpired event.
    pub fn reservation_expired(reservation: &StockReservation) -> Self {
        InventoryEvent::ReservationExpired(Self::reservation_data(reservation))
    }

    /// Creates an OperationCreated event.
    pub fn operation_created(operation: &WarehouseOperation) -> Self {
        InventoryEvent::OperationCreated(Self::operation_data(operation))
    }

    /// Creates an OperationCompleted event.
    pub fn operation_completed(operation: &WarehouseOperation) -> Self {
        InventoryEvent::OperationCompleted(Self::operation_data(operation))
    }

    /// Creates an OperationCancelled event.
    pub fn operation_cancelled(operation: &WarehouseOperation, reason: impl Into<String>) -> Self {
        InventoryEvent::OperationCancelled(OperationCancelledData {
            operation_id: operation.id(),
            warehouse_id: operation.warehouse_id(),
            operation_type: operation.operation_type(),
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })
    }

    /// Creates an InventoryShipped event.
    pub fn inventory_shipped(
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: u32,
        reference: Reference,
        operation_id: OperationId,
    ) -> Self {
        InventoryEvent::InventoryShipped(InventoryShippedData {
            product_id,
            warehouse_id,
            quantity,
            reference,
            operation_id,
            shipped_at: Utc::now(),
        })
    }

    /// Creates an InventoryReceived event from the updated ledger entry.
    pub fn inventory_received(item: &InventoryItem, quantity: u32, unit_cost: Money) -> Self {
        InventoryEvent::InventoryReceived(InventoryReceivedData {
            product_id: item.product_id(),
            warehouse_id: item.warehouse_id(),
            quantity,
            unit_cost,
            on_hand: item.quantity(),
            received_at: Utc::now(),
        })
    }

    /// Creates an InventoryAdjusted event from the updated ledger entry.
    pub fn inventory_adjusted(item: &InventoryItem, delta: i64, reason: impl Into<String>) -> Self {
        InventoryEvent::InventoryAdjusted(InventoryAdjustedData {
            product_id: item.product_id(),
            warehouse_id: item.warehouse_id(),
            delta,
            reason: reason.into(),
            on_hand: item.quantity(),
            adjusted_at: Utc::now(),
        })
    }
}
