//! In-memory repositories for testing and single-process wiring.
//!
//! Each store keeps its records behind a shared `RwLock`, enforces the same
//! version checks a real document store would, and exposes switches to inject
//! failures.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{OperationId, ProductId, ReservationId, TenantId, Version, WarehouseId};
use tokio::sync::RwLock;

use crate::error::{InventoryError, Result};
use crate::ledger::InventoryItem;
use crate::operation::WarehouseOperation;
use crate::repository::{
    InventoryRepository, OperationRepository, ReservationRepository, WarehouseRepository,
};
use crate::reservation::{ReservationStatus, StockReservation};
use crate::warehouse::Warehouse;

type ItemKey = (TenantId, ProductId, WarehouseId);

fn conflict(entity: &'static str, id: impl std::fmt::Display, expected: Version, actual: Version) -> InventoryError {
    InventoryError::ConcurrencyConflict {
        entity,
        id: id.to_string(),
        expected,
        actual,
    }
}

#[derive(Default)]
struct InventoryState {
    items: HashMap<ItemKey, InventoryItem>,
    failing_products: HashSet<ProductId>,
    forced_conflicts: u32,
    updates: u64,
}

/// In-memory stock ledger store.
#[derive(Clone, Default)]
pub struct InMemoryInventoryRepository {
    state: Arc<RwLock<InventoryState>>,
}

impl InMemoryInventoryRepository {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an item as-is, replacing any existing entry for its key.
    pub async fn seed(&self, mut item: InventoryItem) {
        if item.version() == Version::initial() {
            item.set_version(Version::first());
        }
        let key = (item.tenant_id(), item.product_id(), item.warehouse_id());
        self.state.write().await.items.insert(key, item);
    }

    /// Returns the stored entry, if any.
    pub async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Option<InventoryItem> {
        self.state
            .read()
            .await
            .items
            .get(&(tenant_id, product_id, warehouse_id))
            .cloned()
    }

    /// Makes every update of the given product fail with a repository error.
    pub async fn set_fail_on_update(&self, product_id: ProductId, fail: bool) {
        let mut state = self.state.write().await;
        if fail {
            state.failing_products.insert(product_id);
        } else {
            state.failing_products.remove(&product_id);
        }
    }

    /// Rejects the next `count` updates as if another writer got there first.
    pub async fn force_conflicts(&self, count: u32) {
        self.state.write().await.forced_conflicts = count;
    }

    /// Returns the number of successful updates.
    pub async fn update_count(&self) -> u64 {
        self.state.read().await.updates
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn find_by_product_and_warehouse(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<InventoryItem> {
        self.get(tenant_id, product_id, warehouse_id)
            .await
            .ok_or_else(|| {
                InventoryError::not_found(
                    "inventory item",
                    format!("product {} in warehouse {}", product_id, warehouse_id),
                )
            })
    }

    async fn insert(&self, mut item: InventoryItem) -> Result<InventoryItem> {
        let key = (item.tenant_id(), item.product_id(), item.warehouse_id());
        let mut state = self.state.write().await;

        if let Some(existing) = state.items.get(&key) {
            return Err(conflict(
                "inventory item",
                item.product_id(),
                Version::initial(),
                existing.version(),
            ));
        }

        item.set_version(Version::first());
        state.items.insert(key, item.clone());
        Ok(item)
    }

    async fn update(&self, mut item: InventoryItem) -> Result<InventoryItem> {
        let key = (item.tenant_id(), item.product_id(), item.warehouse_id());
        let mut state = self.state.write().await;

        if state.failing_products.contains(&item.product_id()) {
            return Err(InventoryError::Repository(format!(
                "write rejected for inventory item {}",
                item.product_id()
            )));
        }

        let current = state
            .items
            .get(&key)
            .map(InventoryItem::version)
            .ok_or_else(|| InventoryError::not_found("inventory item", item.product_id()))?;

        if state.forced_conflicts > 0 {
            state.forced_conflicts -= 1;
            return Err(conflict(
                "inventory item",
                item.product_id(),
                item.version(),
                current.next(),
            ));
        }

        if current != item.version() {
            return Err(conflict(
                "inventory item",
                item.product_id(),
                item.version(),
                current,
            ));
        }

        item.set_version(current.next());
        state.items.insert(key, item.clone());
        state.updates += 1;
        Ok(item)
    }
}

#[derive(Default)]
struct ReservationState {
    reservations: HashMap<ReservationId, StockReservation>,
    fail_on_create: bool,
    fail_on_update: bool,
}

/// In-memory reservation store.
#[derive(Clone, Default)]
pub struct InMemoryReservationRepository {
    state: Arc<RwLock<ReservationState>>,
}

impl InMemoryReservationRepository {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures create calls to fail.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Configures update calls to fail.
    pub async fn set_fail_on_update(&self, fail: bool) {
        self.state.write().await.fail_on_update = fail;
    }

    /// Returns every stored reservation.
    pub async fn all(&self) -> Vec<StockReservation> {
        self.state.read().await.reservations.values().cloned().collect()
    }

    /// Returns the number of reservations in the given state.
    pub async fn count_with_status(&self, status: ReservationStatus) -> usize {
        self.state
            .read()
            .await
            .reservations
            .values()
            .filter(|r| r.status() == status)
            .count()
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn create(&self, mut reservation: StockReservation) -> Result<StockReservation> {
        let mut state = self.state.write().await;
        if state.fail_on_create {
            return Err(InventoryError::Repository(
                "reservation store unavailable".to_string(),
            ));
        }
        if state.reservations.contains_key(&reservation.id()) {
            return Err(InventoryError::Repository(format!(
                "reservation {} already exists",
                reservation.id()
            )));
        }

        reservation.set_version(Version::first());
        state
            .reservations
            .insert(reservation.id(), reservation.clone());
        Ok(reservation)
    }

    async fn update(&self, mut reservation: StockReservation) -> Result<StockReservation> {
        let mut state = self.state.write().await;
        if state.fail_on_update {
            return Err(InventoryError::Repository(
                "reservation store unavailable".to_string(),
            ));
        }

        let current = state
            .reservations
            .get(&reservation.id())
            .map(StockReservation::version)
            .ok_or_else(|| InventoryError::not_found("reservation", reservation.id()))?;
        if current != reservation.version() {
            return Err(conflict(
                "reservation",
                reservation.id(),
                reservation.version(),
                current,
            ));
        }

        reservation.set_version(current.next());
        state
            .reservations
            .insert(reservation.id(), reservation.clone());
        Ok(reservation)
    }

    async fn find_by_id(&self, id: ReservationId) -> Result<StockReservation> {
        self.state
            .read()
            .await
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| InventoryError::not_found("reservation", id))
    }
}

#[derive(Default)]
struct OperationState {
    operations: HashMap<OperationId, WarehouseOperation>,
    fail_on_create: bool,
    fail_on_update: bool,
}

/// In-memory warehouse task store.
#[derive(Clone, Default)]
pub struct InMemoryOperationRepository {
    state: Arc<RwLock<OperationState>>,
}

impl InMemoryOperationRepository {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures create calls to fail.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Configures update calls to fail.
    pub async fn set_fail_on_update(&self, fail: bool) {
        self.state.write().await.fail_on_update = fail;
    }

    /// Returns every stored task.
    pub async fn all(&self) -> Vec<WarehouseOperation> {
        self.state.read().await.operations.values().cloned().collect()
    }
}

#[async_trait]
impl OperationRepository for InMemoryOperationRepository {
    async fn create(&self, mut operation: WarehouseOperation) -> Result<WarehouseOperation> {
        let mut state = self.state.write().await;
        if state.fail_on_create {
            return Err(InventoryError::Repository(
                "operation store unavailable".to_string(),
            ));
        }

        operation.set_version(Version::first());
        state.operations.insert(operation.id(), operation.clone());
        Ok(operation)
    }

    async fn update(&self, mut operation: WarehouseOperation) -> Result<WarehouseOperation> {
        let mut state = self.state.write().await;
        if state.fail_on_update {
            return Err(InventoryError::Repository(
                "operation store unavailable".to_string(),
            ));
        }

        let current = state
            .operations
            .get(&operation.id())
            .map(WarehouseOperation::version)
            .ok_or_else(|| InventoryError::not_found("warehouse operation", operation.id()))?;
        if current != operation.version() {
            return Err(conflict(
                "warehouse operation",
                operation.id(),
                operation.version(),
                current,
            ));
        }

        operation.set_version(current.next());
        state.operations.insert(operation.id(), operation.clone());
        Ok(operation)
    }

    async fn find_by_id(&self, id: OperationId) -> Result<WarehouseOperation> {
        self.state
            .read()
            .await
            .operations
            .get(&id)
            .cloned()
            .ok_or_else(|| InventoryError::not_found("warehouse operation", id))
    }
}

/// In-memory warehouse directory.
#[derive(Clone, Default)]
pub struct InMemoryWarehouseRepository {
    warehouses: Arc<RwLock<Vec<Warehouse>>>,
}

impl InMemoryWarehouseRepository {
    /// Creates a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a warehouse.
    pub async fn add(&self, warehouse: Warehouse) {
        self.warehouses.write().await.push(warehouse);
    }
}

#[async_trait]
impl WarehouseRepository for InMemoryWarehouseRepository {
    async fn find_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<Warehouse>> {
        Ok(self
            .warehouses
            .read()
            .await
            .iter()
            .filter(|w| w.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}
