//! Shared types for the fulfillment engine.
//!
//! Every entity in the system is addressed by a strongly typed UUID wrapper so
//! that a `ProductId` can never be passed where a `WarehouseId` is expected.

pub mod context;
pub mod error;
pub mod types;
pub mod version;

pub use context::CommandContext;
pub use error::IdError;
pub use types::{
    CorrelationId, CustomerId, LocationId, OperationId, OrderId, ProductId, ReservationId,
    SagaId, TenantId, UserId, VariantId, WarehouseId,
};
pub use version::Version;
