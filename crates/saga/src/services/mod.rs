//! Collaborators the saga depends on, with in-memory implementations.

pub mod location;
pub mod saga_store;

pub use location::{LocationAssigner, WarehouseLocationAssigner};
pub use saga_store::{InMemorySagaRepository, SagaRepository};
