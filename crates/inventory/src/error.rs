//! Inventory error types.

use common::{ProductId, Version, WarehouseId};
use thiserror::Error;

use crate::reservation::StockReservation;

/// Errors that can occur during inventory, reservation and warehouse operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Not enough unreserved stock to satisfy a reservation.
    #[error(
        "Insufficient stock for product {product_id} in warehouse {warehouse_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        warehouse_id: WarehouseId,
        requested: u32,
        available: u32,
    },

    /// A shipment exceeds what is reserved or physically on hand.
    #[error(
        "Insufficient reserved stock for product {product_id} in warehouse {warehouse_id}: requested {requested}, reserved {reserved}, on hand {on_hand}"
    )]
    InsufficientReservedOrStock {
        product_id: ProductId,
        warehouse_id: WarehouseId,
        requested: u32,
        reserved: u32,
        on_hand: u32,
    },

    /// Quantity must be greater than zero.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// A manual correction would break the ledger invariant.
    #[error("Invalid adjustment: {0}")]
    InvalidAdjustment(String),

    /// The requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The entity is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} {entity} in {current} state")]
    InvalidStateTransition {
        entity: &'static str,
        current: String,
        action: &'static str,
    },

    /// The stored record changed between read and write.
    #[error(
        "Concurrency conflict for {entity} {id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// The backing store failed.
    #[error("Repository error: {0}")]
    Repository(String),

    /// A multi-item reservation stopped partway through.
    ///
    /// `reserved` holds the reservations that were created before the failure
    /// and are still active.
    #[error("Reservation stopped after {} item(s): {source}", reserved.len())]
    PartialReservation {
        reserved: Vec<StockReservation>,
        #[source]
        source: Box<InventoryError>,
    },
}

impl InventoryError {
    /// Creates a `NotFound` error for the given entity.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        InventoryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true for optimistic-concurrency conflicts, which are safe to retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, InventoryError::ConcurrencyConflict { .. })
    }
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;
