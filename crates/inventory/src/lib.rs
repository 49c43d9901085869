//! Inventory layer of the fulfillment engine.
//!
//! This crate provides:
//! - the per (tenant, product, warehouse) stock ledger ([`InventoryItem`])
//! - stock reservations and their lifecycle ([`StockReservation`])
//! - warehouse tasks as a state machine ([`WarehouseOperation`])
//! - repository traits for the external stores, plus in-memory implementations
//! - the [`ReservationManager`], which pairs reservation records with ledger
//!   mutations under optimistic concurrency control

pub mod error;
pub mod events;
pub mod ledger;
pub mod manager;
pub mod memory;
pub mod money;
pub mod operation;
pub mod repository;
pub mod reservation;
pub mod warehouse;

pub use error::{InventoryError, Result};
pub use crate::events::InventoryEvent;
pub use ledger::InventoryItem;
pub use manager::{
    DEFAULT_MAX_UPDATE_RETRIES, ReservationConfig, ReservationManager, ReservationRequest,
};
pub use memory::{
    InMemoryInventoryRepository, InMemoryOperationRepository, InMemoryReservationRepository,
    InMemoryWarehouseRepository,
};
pub use money::Money;
pub use operation::{ItemStatus, OperationItem, OperationStatus, OperationType, WarehouseOperation};
pub use repository::{
    InventoryRepository, OperationRepository, ReservationRepository, WarehouseRepository,
};
pub use reservation::{Reference, ReservationStatus, StockReservation};
pub use warehouse::Warehouse;
