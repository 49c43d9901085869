use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CommandContext, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EventError, Result};

/// Metadata key for the acting user.
pub const META_USER_ID: &str = "user_id";

/// Metadata key for the correlation id of the triggering command.
pub const META_CORRELATION_ID: &str = "correlation_id";

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and named in past tense on the wire
/// (e.g. `stock.reserved`).
pub trait DomainEvent: Serialize + Send + Sync {
    /// Returns the routing name of the event (e.g. `"reservation.released"`).
    fn event_type(&self) -> &'static str;

    /// Returns the type of the entity the event is about.
    fn aggregate_type(&self) -> &'static str;

    /// Returns the id of the entity the event is about.
    fn aggregate_id(&self) -> Uuid;
}

/// An event envelope containing an event along with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The type of the event (e.g., "stock.reserved").
    pub event_type: String,

    /// The entity this event belongs to.
    pub aggregate_id: Uuid,

    /// The type of entity (e.g., "StockReservation").
    pub aggregate_type: String,

    /// The tenant the event belongs to.
    pub tenant_id: TenantId,

    /// When the event was created.
    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Additional metadata about the event (acting user, correlation id).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Wraps a domain event, stamping it with the command context.
    pub fn from_event<E: DomainEvent>(ctx: &CommandContext, event: &E) -> Result<Self> {
        EventEnvelope::builder()
            .event_type(event.event_type())
            .aggregate_id(event.aggregate_id())
            .aggregate_type(event.aggregate_type())
            .context(ctx)
            .payload(event)?
            .build()
    }

    /// Returns the acting user recorded in the metadata, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.metadata.get(META_USER_ID).and_then(|v| v.as_str())
    }

    /// Returns the correlation id recorded in the metadata, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata
            .get(META_CORRELATION_ID)
            .and_then(|v| v.as_str())
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<Uuid>,
    aggregate_type: Option<String>,
    tenant_id: Option<TenantId>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: Uuid) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the tenant.
    pub fn tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Copies tenant, acting user and correlation id from a command context.
    pub fn context(self, ctx: &CommandContext) -> Self {
        self.tenant_id(ctx.tenant_id)
            .metadata(META_USER_ID, serde_json::json!(ctx.user_id.to_string()))
            .metadata(
                META_CORRELATION_ID,
                serde_json::json!(ctx.correlation_id.to_string()),
            )
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the event envelope, failing if a required field is missing.
    pub fn build(self) -> Result<EventEnvelope> {
        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self
                .event_type
                .ok_or(EventError::MissingField("event_type"))?,
            aggregate_id: self
                .aggregate_id
                .ok_or(EventError::MissingField("aggregate_id"))?,
            aggregate_type: self
                .aggregate_type
                .ok_or(EventError::MissingField("aggregate_type"))?,
            tenant_id: self.tenant_id.ok_or(EventError::MissingField("tenant_id"))?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self.payload.ok_or(EventError::MissingField("payload"))?,
            metadata: self.metadata,
        })
    }
}
