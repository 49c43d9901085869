//! Domain events and the publishing boundary.
//!
//! Events are wrapped in an [`EventEnvelope`] carrying the tenant, acting user
//! and correlation id of the command that caused them, then handed to an
//! [`EventPublisher`]. Delivery is fire-and-forget from the core's point of
//! view: [`EventPublisherExt::publish_best_effort`] logs failures and moves on.

pub mod error;
pub mod event;
pub mod memory;
pub mod publisher;

pub use error::{EventError, Result};
pub use event::{DomainEvent, EventEnvelope, EventEnvelopeBuilder, EventId};
pub use memory::InMemoryPublisher;
pub use publisher::{EventPublisher, EventPublisherExt};
