//! Per (tenant, product, warehouse) stock bookkeeping.

use chrono::{DateTime, Utc};
use common::{ProductId, TenantId, Version, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};
use crate::money::Money;

/// Stock ledger entry for one product in one warehouse.
///
/// Invariant, checked after every mutation:
/// `reserved_qty <= quantity` and `available_qty == quantity - reserved_qty`.
/// `available_qty` is stored for readers but only ever written by
/// [`InventoryItem::recompute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    tenant_id: TenantId,
    product_id: ProductId,
    warehouse_id: WarehouseId,

    /// Physically on hand.
    quantity: u32,

    /// Claimed by active reservations.
    reserved_qty: u32,

    /// `quantity - reserved_qty`.
    available_qty: u32,

    /// Weighted-average unit cost.
    unit_cost: Money,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Creates an empty ledger entry.
    pub fn new(tenant_id: TenantId, product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            tenant_id,
            product_id,
            warehouse_id,
            quantity: 0,
            reserved_qty: 0,
            available_qty: 0,
            unit_cost: Money::zero(),
            version: Version::initial(),
            updated_at: Utc::now(),
        }
    }

    /// Creates a ledger entry with opening stock at zero cost.
    pub fn with_quantity(
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: u32,
    ) -> Self {
        let mut item = Self::new(tenant_id, product_id, warehouse_id);
        item.quantity = quantity;
        item.recompute();
        item
    }
}

// Query methods
impl InventoryItem {
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    /// Returns the on-hand quantity.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Returns the reserved quantity.
    pub fn reserved_qty(&self) -> u32 {
        self.reserved_qty
    }

    /// Returns the quantity free to reserve.
    pub fn available_qty(&self) -> u32 {
        self.available_qty
    }

    pub fn unit_cost(&self) -> Money {
        self.unit_cost
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Sets the stored version. Called by repositories after a write.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the ledger invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.reserved_qty <= self.quantity
            && self.available_qty == self.quantity - self.reserved_qty
    }
}

// Mutations
impl InventoryItem {
    /// Claims `qty` units of available stock.
    pub fn reserve(&mut self, qty: u32) -> Result<()> {
        if qty == 0 {
            return Err(InventoryError::InvalidQuantity { quantity: qty });
        }
        if qty > self.available_qty {
            return Err(InventoryError::InsufficientStock {
                product_id: self.product_id,
                warehouse_id: self.warehouse_id,
                requested: qty,
                available: self.available_qty,
            });
        }

        self.reserved_qty += qty;
        self.touch();
        Ok(())
    }

    /// Gives back `qty` reserved units, flooring at zero.
    ///
    /// Does not check the amount against any particular reservation; callers
    /// pass the quantity they reserved.
    pub fn release_reservation(&mut self, qty: u32) {
        self.reserved_qty = self.reserved_qty.saturating_sub(qty);
        self.touch();
    }

    /// Gives back exactly `qty` reserved units.
    ///
    /// Unlike [`release_reservation`](Self::release_reservation) this fails
    /// when fewer than `qty` units are reserved.
    pub fn unreserve(&mut self, qty: u32) -> Result<()> {
        if qty == 0 {
            return Err(InventoryError::InvalidQuantity { quantity: qty });
        }
        if qty > self.reserved_qty {
            return Err(InventoryError::InsufficientReservedOrStock {
                product_id: self.product_id,
                warehouse_id: self.warehouse_id,
                requested: qty,
                reserved: self.reserved_qty,
                on_hand: self.quantity,
            });
        }

        self.reserved_qty -= qty;
        self.touch();
        Ok(())
    }

    /// Permanently removes `qty` reserved units from stock.
    pub fn ship(&mut self, qty: u32) -> Result<()> {
        if qty == 0 {
            return Err(InventoryError::InvalidQuantity { quantity: qty });
        }
        if qty > self.reserved_qty || qty > self.quantity {
            return Err(InventoryError::InsufficientReservedOrStock {
                product_id: self.product_id,
                warehouse_id: self.warehouse_id,
                requested: qty,
                reserved: self.reserved_qty,
                on_hand: self.quantity,
            });
        }

        self.quantity -= qty;
        self.reserved_qty -= qty;
        self.touch();
        Ok(())
    }

    /// Reverses a [`ship`](Self::ship): `qty` units go back on hand, still
    /// reserved.
    pub fn return_shipped(&mut self, qty: u32) -> Result<()> {
        let (Some(quantity), Some(reserved_qty)) = (
            self.quantity.checked_add(qty),
            self.reserved_qty.checked_add(qty),
        ) else {
            return Err(InventoryError::InvalidAdjustment(format!(
                "returning {} shipped units would overflow",
                qty
            )));
        };

        self.quantity = quantity;
        self.reserved_qty = reserved_qty;
        self.touch();
        Ok(())
    }

    /// Books `qty` incoming units and folds their cost into the average.
    pub fn receive(&mut self, qty: u32, unit_cost: Money) -> Result<()> {
        if qty == 0 {
            return Err(InventoryError::InvalidQuantity { quantity: qty });
        }
        if unit_cost.is_negative() {
            return Err(InventoryError::InvalidAdjustment(format!(
                "unit cost {} is negative",
                unit_cost
            )));
        }
        let new_quantity = self.quantity.checked_add(qty).ok_or_else(|| {
            InventoryError::InvalidAdjustment(format!("receiving {} would overflow", qty))
        })?;

        self.unit_cost = self
            .unit_cost
            .weighted_average(self.quantity, unit_cost, qty);
        self.quantity = new_quantity;
        self.touch();
        Ok(())
    }

    /// Applies a signed manual correction to the on-hand quantity.
    pub fn adjust(&mut self, delta: i64, reason: &str) -> Result<()> {
        if reason.trim().is_empty() {
            return Err(InventoryError::InvalidAdjustment(
                "a reason is required".to_string(),
            ));
        }
        if delta == 0 {
            return Err(InventoryError::InvalidAdjustment(
                "delta must be non-zero".to_string(),
            ));
        }

        let target = i64::from(self.quantity) + delta;
        let new_quantity = u32::try_from(target).map_err(|_| {
            InventoryError::InvalidAdjustment(format!(
                "adjusting {} by {} leaves an impossible quantity",
                self.quantity, delta
            ))
        })?;
        self.set_counted_quantity(new_quantity)
    }

    /// Replaces the on-hand quantity with a physical count.
    ///
    /// Returns the variance (counted minus booked).
    pub fn count(&mut self, counted: u32) -> Result<i64> {
        let variance = i64::from(counted) - i64::from(self.quantity);
        self.set_counted_quantity(counted)?;
        Ok(variance)
    }

    fn set_counted_quantity(&mut self, new_quantity: u32) -> Result<()> {
        if new_quantity < self.reserved_qty {
            return Err(InventoryError::InvalidAdjustment(format!(
                "quantity {} would fall below reserved {}",
                new_quantity, self.reserved_qty
            )));
        }
        self.quantity = new_quantity;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.recompute();
        self.updated_at = Utc::now();
    }

    /// Re-derives `available_qty` from on-hand and reserved.
    fn recompute(&mut self) {
        self.available_qty = self.quantity.saturating_sub(self.reserved_qty);
    }
}
