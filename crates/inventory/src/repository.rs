//! Storage boundaries consumed by the inventory and saga layers.
//!
//! Every `update` is conditional: the record passed in carries the version it
//! was loaded at, and the store must reject the write with
//! [`InventoryError::ConcurrencyConflict`](crate::InventoryError) if the stored
//! version has moved on. On success the stored record is returned with its
//! bumped version.

use async_trait::async_trait;
use common::{OperationId, ProductId, ReservationId, TenantId, WarehouseId};

use crate::error::Result;
use crate::ledger::InventoryItem;
use crate::operation::WarehouseOperation;
use crate::reservation::StockReservation;
use crate::warehouse::Warehouse;

/// Stock ledger store, keyed by (tenant, product, warehouse).
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Loads the ledger entry, or `NotFound`.
    async fn find_by_product_and_warehouse(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<InventoryItem>;

    /// Inserts a new ledger entry. Fails if one already exists for the key.
    async fn insert(&self, item: InventoryItem) -> Result<InventoryItem>;

    /// Conditionally replaces a ledger entry.
    async fn update(&self, item: InventoryItem) -> Result<InventoryItem>;
}

/// Reservation record store.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create(&self, reservation: StockReservation) -> Result<StockReservation>;

    /// Conditionally replaces a reservation.
    async fn update(&self, reservation: StockReservation) -> Result<StockReservation>;

    async fn find_by_id(&self, id: ReservationId) -> Result<StockReservation>;
}

/// Warehouse task store.
#[async_trait]
pub trait OperationRepository: Send + Sync {
    async fn create(&self, operation: WarehouseOperation) -> Result<WarehouseOperation>;

    /// Conditionally replaces a task.
    async fn update(&self, operation: WarehouseOperation) -> Result<WarehouseOperation>;

    async fn find_by_id(&self, id: OperationId) -> Result<WarehouseOperation>;
}

/// Read-only warehouse directory.
#[async_trait]
pub trait WarehouseRepository: Send + Sync {
    async fn find_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<Warehouse>>;
}
