//! Service error types and their classification.

use common::IdError;
use inventory::InventoryError;
use saga::SagaError;
use thiserror::Error;

/// Coarse category of a failure, for callers that map errors onto a
/// transport (status codes, retry decisions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The addressed saga, reservation or stock record does not exist.
    NotFound,
    /// The command itself is malformed or asks for something impossible.
    InvalidInput,
    /// The target is in the wrong state or changed concurrently.
    Conflict,
    /// Store, configuration or telemetry failure.
    Internal,
}

/// Errors returned by the fulfillment service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A raw identifier in a command could not be parsed.
    #[error(transparent)]
    InvalidId(#[from] IdError),

    /// Saga execution error.
    #[error(transparent)]
    Saga(#[from] SagaError),

    /// Inventory or reservation error.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The log subscriber or metrics recorder could not be installed.
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl ServiceError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidId(_) => ErrorKind::InvalidInput,
            ServiceError::Saga(err) => saga_error_kind(err),
            ServiceError::Inventory(err) => inventory_error_kind(err),
            ServiceError::Config(_) | ServiceError::Telemetry(_) => ErrorKind::Internal,
        }
    }
}

fn saga_error_kind(err: &SagaError) -> ErrorKind {
    match err {
        SagaError::NotFound(_) => ErrorKind::NotFound,
        SagaError::InvalidUserId(_) | SagaError::InvalidReference(_) | SagaError::EmptyOrder => {
            ErrorKind::InvalidInput
        }
        SagaError::InvalidState { .. }
        | SagaError::InvalidStepTransition { .. }
        | SagaError::ConcurrencyConflict { .. } => ErrorKind::Conflict,
        SagaError::Inventory(inner) => inventory_error_kind(inner),
        SagaError::Repository(_) | SagaError::Serialization(_) => ErrorKind::Internal,
    }
}

fn inventory_error_kind(err: &InventoryError) -> ErrorKind {
    match err {
        InventoryError::NotFound { .. } => ErrorKind::NotFound,
        InventoryError::InsufficientStock { .. }
        | InventoryError::InsufficientReservedOrStock { .. }
        | InventoryError::InvalidQuantity { .. }
        | InventoryError::InvalidAdjustment(_) => ErrorKind::InvalidInput,
        InventoryError::InvalidStateTransition { .. }
        | InventoryError::ConcurrencyConflict { .. } => ErrorKind::Conflict,
        InventoryError::PartialReservation { source, .. } => inventory_error_kind(source),
        InventoryError::Repository(_) => ErrorKind::Internal,
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ProductId, SagaId, WarehouseId};

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ServiceError::from(IdError::new("product id", "nope")).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            ServiceError::from(SagaError::NotFound(SagaId::new())).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ServiceError::from(SagaError::InvalidUserId("x".into())).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            ServiceError::Config("bad".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_nested_inventory_errors_are_unwrapped() {
        let insufficient = InventoryError::InsufficientStock {
            product_id: ProductId::new(),
            warehouse_id: WarehouseId::new(),
            requested: 5,
            available: 1,
        };
        let err = ServiceError::from(SagaError::Inventory(insufficient));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let partial = InventoryError::PartialReservation {
            reserved: Vec::new(),
            source: Box::new(InventoryError::not_found("inventory item", ProductId::new())),
        };
        assert_eq!(ServiceError::from(partial).kind(), ErrorKind::NotFound);

        let conflict = InventoryError::InvalidStateTransition {
            entity: "reservation",
            current: "released".into(),
            action: "commit",
        };
        assert_eq!(ServiceError::from(conflict).kind(), ErrorKind::Conflict);
    }
}
