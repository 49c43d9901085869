//! Pick-location assignment.

use async_trait::async_trait;
use common::{LocationId, ProductId, TenantId, WarehouseId};
use inventory::{InventoryError, WarehouseRepository};

use crate::error::Result;

/// Decides where in a warehouse a product is picked from.
#[async_trait]
pub trait LocationAssigner: Send + Sync {
    async fn assign(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<LocationId>;
}

/// Uses the warehouse's default pick location for every product.
///
/// Fails with `NotFound` if the tenant has no active warehouse with the given
/// id.
#[derive(Debug, Clone)]
pub struct WarehouseLocationAssigner<W> {
    warehouses: W,
}

impl<W: WarehouseRepository> WarehouseLocationAssigner<W> {
    pub fn new(warehouses: W) -> Self {
        Self { warehouses }
    }

    pub fn warehouses(&self) -> &W {
        &self.warehouses
    }
}

#[async_trait]
impl<W: WarehouseRepository> LocationAssigner for WarehouseLocationAssigner<W> {
    async fn assign(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<LocationId> {
        let location = self
            .warehouses
            .find_by_tenant(tenant_id)
            .await?
            .into_iter()
            .find(|w| w.id == warehouse_id && w.active)
            .map(|w| w.default_pick_location)
            .ok_or_else(|| InventoryError::not_found("warehouse", warehouse_id))?;

        tracing::debug!(%warehouse_id, %product_id, %location, "pick location assigned");
        Ok(location)
    }
}
