//! Stock reservations.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, ReservationId, TenantId, UserId, Version, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

/// Lifecycle of a reservation.
///
/// State transitions:
/// ```text
/// Active ──┬──► Released
///          ├──► Fulfilled
///          └──► Expired
/// ```
/// Every non-active state is terminal; a reservation never returns to Active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Stock is held for the reference.
    #[default]
    Active,

    /// Hold given back without consuming stock (cancellation or compensation).
    Released,

    /// Hold converted into a permanent deduction.
    Fulfilled,

    /// Hold lapsed at its expiry time.
    Expired,
}

impl ReservationStatus {
    /// Returns true if the reservation still holds stock.
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Active)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Released => "released",
            ReservationStatus::Fulfilled => "fulfilled",
            ReservationStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a reservation or warehouse task is held for, e.g. `order/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Document type, e.g. "order".
    pub kind: String,
    /// Document id.
    pub id: String,
}

impl Reference {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Reference to a sales order.
    pub fn order(order_id: OrderId) -> Self {
        Self::new("order", order_id.to_string())
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A claim on inventory for one product in one warehouse.
///
/// An active reservation always corresponds to `quantity` units counted in
/// the matching [`InventoryItem`](crate::InventoryItem)'s reserved quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservation {
    id: ReservationId,
    tenant_id: TenantId,
    product_id: ProductId,
    warehouse_id: WarehouseId,
    reference: Reference,
    quantity: u32,
    status: ReservationStatus,
    expires_at: Option<DateTime<Utc>>,
    release_reason: Option<String>,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    version: Version,
}

impl StockReservation {
    /// Creates a new active reservation.
    pub fn new(
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        reference: Reference,
        quantity: u32,
        created_by: UserId,
    ) -> Result<Self> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity { quantity });
        }

        let now = Utc::now();
        Ok(Self {
            id: ReservationId::new(),
            tenant_id,
            product_id,
            warehouse_id,
            reference,
            quantity,
            status: ReservationStatus::Active,
            expires_at: None,
            release_reason: None,
            created_by,
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        })
    }

    /// Sets an expiry time.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

// Query methods
impl StockReservation {
    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the reservation carries an expiry at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn release_reason(&self) -> Option<&str> {
        self.release_reason.as_deref()
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Sets the stored version. Called by repositories after a write.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

// Transitions
impl StockReservation {
    /// Marks the reservation released.
    pub fn release(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(ReservationStatus::Released, "release")?;
        self.release_reason = Some(reason.into());
        Ok(())
    }

    /// Marks the reservation fulfilled (stock committed).
    pub fn fulfill(&mut self) -> Result<()> {
        self.transition(ReservationStatus::Fulfilled, "commit")
    }

    /// Marks the reservation expired. Only valid once `expires_at` has passed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.is_active() && !self.is_expired_at(now) {
            return Err(InventoryError::InvalidStateTransition {
                entity: "reservation",
                current: "active (not yet expired)".to_string(),
                action: "expire",
            });
        }
        self.transition(ReservationStatus::Expired, "expire")
    }

    fn transition(&mut self, to: ReservationStatus, action: &'static str) -> Result<()> {
        if !self.status.is_active() {
            return Err(InventoryError::InvalidStateTransition {
                entity: "reservation",
                current: self.status.to_string(),
                action,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
