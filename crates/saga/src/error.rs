//! Saga error types.

use common::{SagaId, Version};
use inventory::InventoryError;
use thiserror::Error;

use crate::order_fulfillment::SagaStepKind;
use crate::state::{SagaStatus, StepStatus};

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Saga is in an invalid state for the requested operation.
    #[error("Invalid saga state: cannot {action} saga {saga_id} in {actual} state")]
    InvalidState {
        saga_id: SagaId,
        action: &'static str,
        actual: SagaStatus,
    },

    /// A step was driven out of order.
    #[error("Invalid step transition: cannot {action} step {step} in {current} state")]
    InvalidStepTransition {
        step: SagaStepKind,
        current: StepStatus,
        action: &'static str,
    },

    /// Inventory, reservation or warehouse error.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Saga not found.
    #[error("Saga not found: {0}")]
    NotFound(SagaId),

    /// The acting user id could not be parsed.
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    /// The order reference could not be parsed.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// The order has no lines to fulfil.
    #[error("Order has no items")]
    EmptyOrder,

    /// The stored saga changed since it was loaded.
    #[error("Concurrency conflict for saga {saga_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        saga_id: SagaId,
        expected: Version,
        actual: Version,
    },

    /// The saga store failed.
    #[error("Repository error: {0}")]
    Repository(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
