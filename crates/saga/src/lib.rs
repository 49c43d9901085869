//! Order fulfillment saga.
//!
//! The saga runs a fixed sequence of steps in two phases:
//!
//! 1. `execute`: validate stock, reserve stock, create the picking task.
//!    The saga is then persisted and waits for picking.
//! 2. `complete_picking`: wait for picking, pack, ship, commit the
//!    reservations, send the notification.
//!
//! A failure after stock was reserved in phase 1 releases the reservations
//! and cancels the pick task. Phase 2 failures are recorded but never
//! compensated.

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod order_fulfillment;
pub mod services;
pub mod state;

pub use aggregate::{FulfillmentItem, FulfillmentItemStatus, OrderFulfillmentSaga, SagaStep};
pub use config::SagaConfig;
pub use coordinator::{CompensationReport, SagaOrchestrator};
pub use error::{Result, SagaError};
pub use crate::events::SagaEvent;
pub use order_fulfillment::{COMPENSATION_REASON, DEFAULT_PICK_PRIORITY, SAGA_TYPE, SagaStepKind};
pub use services::{
    InMemorySagaRepository, LocationAssigner, SagaRepository, WarehouseLocationAssigner,
};
pub use state::{SagaStatus, StepStatus};
