//! Warehouse tasks (receipt, pick, pack, ship) as a state machine.

use chrono::{DateTime, Utc};
use common::{LocationId, OperationId, ProductId, TenantId, UserId, VariantId, Version, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};
use crate::reservation::Reference;

/// Default priority of a newly created task (1 lowest, 10 highest).
pub const DEFAULT_PRIORITY: u8 = 5;

/// Kind of warehouse task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Receipt,
    Pick,
    Pack,
    Ship,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Receipt => "receipt",
            OperationType::Pick => "pick",
            OperationType::Pack => "pack",
            OperationType::Ship => "ship",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of a warehouse task.
///
/// State transitions:
/// ```text
/// Pending ──► InProgress ──► Completed
///    │            │
///    └────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl OperationStatus {
    /// Returns true if the task can be started.
    pub fn can_start(&self) -> bool {
        matches!(self, OperationStatus::Pending)
    }

    /// Returns true if items can be worked (completed) in this state.
    pub fn can_work_items(&self) -> bool {
        matches!(self, OperationStatus::InProgress)
    }

    /// Returns true if the task can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OperationStatus::Pending | OperationStatus::InProgress)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::InProgress => "in_progress",
            OperationStatus::Completed => "completed",
            OperationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-line status inside a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Completed,
}

/// One line of a warehouse task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub location_id: LocationId,
    pub quantity: u32,
    pub completed_quantity: u32,
    pub status: ItemStatus,
}

impl OperationItem {
    pub fn new(product_id: ProductId, location_id: LocationId, quantity: u32) -> Self {
        Self {
            product_id,
            variant_id: None,
            location_id,
            quantity,
            completed_quantity: 0,
            status: ItemStatus::Pending,
        }
    }

    pub fn with_variant(mut self, variant_id: VariantId) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    /// Units still to be worked on this line.
    pub fn remaining(&self) -> u32 {
        self.quantity.saturating_sub(self.completed_quantity)
    }

    pub fn is_completed(&self) -> bool {
        self.status == ItemStatus::Completed
    }
}

/// A warehouse task for one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseOperation {
    id: OperationId,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    operation_type: OperationType,
    reference: Option<Reference>,
    status: OperationStatus,
    items: Vec<OperationItem>,
    priority: u8,
    created_by: UserId,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    #[serde(default)]
    version: Version,
}

impl WarehouseOperation {
    /// Creates a pending task. Every line must have a positive quantity.
    pub fn new(
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        operation_type: OperationType,
        items: Vec<OperationItem>,
        created_by: UserId,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(InventoryError::InvalidQuantity { quantity: 0 });
        }
        if let Some(bad) = items.iter().find(|i| i.quantity == 0) {
            return Err(InventoryError::InvalidQuantity {
                quantity: bad.quantity,
            });
        }

        Ok(Self {
            id: OperationId::new(),
            tenant_id,
            warehouse_id,
            operation_type,
            reference: None,
            status: OperationStatus::Pending,
            items,
            priority: DEFAULT_PRIORITY,
            created_by,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancel_reason: None,
            version: Version::initial(),
        })
    }

    /// Sets the priority, clamped to 1..=10.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }
}

// Query methods
impl WarehouseOperation {
    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn items(&self) -> &[OperationItem] {
        &self.items
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Sets the stored version. Called by repositories after a write.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Returns true once every line is completed.
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(OperationItem::is_completed)
    }
}

// Transitions
impl WarehouseOperation {
    /// Moves the task from pending to in progress.
    pub fn start(&mut self) -> Result<()> {
        if !self.status.can_start() {
            return Err(self.invalid("start"));
        }
        self.status = OperationStatus::InProgress;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Records `quantity` units worked on the first open line for `product_id`.
    ///
    /// The line completes once its full quantity has been worked.
    pub fn complete_item(&mut self, product_id: ProductId, quantity: u32) -> Result<()> {
        if !self.status.can_work_items() {
            return Err(self.invalid("complete item on"));
        }
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity { quantity });
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id && !i.is_completed())
            .ok_or_else(|| InventoryError::not_found("operation item", product_id))?;

        if quantity > item.remaining() {
            return Err(InventoryError::InvalidAdjustment(format!(
                "cannot complete {} of product {}: only {} remaining",
                quantity,
                product_id,
                item.remaining()
            )));
        }

        item.completed_quantity += quantity;
        if item.completed_quantity == item.quantity {
            item.status = ItemStatus::Completed;
        }
        Ok(())
    }

    /// Completes every open line in full.
    pub fn complete_all_items(&mut self) -> Result<()> {
        let open: Vec<(ProductId, u32)> = self
            .items
            .iter()
            .filter(|i| !i.is_completed())
            .map(|i| (i.product_id, i.remaining()))
            .collect();
        for (product_id, remaining) in open {
            self.complete_item(product_id, remaining)?;
        }
        Ok(())
    }

    /// Closes the task. Every line must already be completed.
    pub fn complete(&mut self) -> Result<()> {
        if !self.status.can_work_items() {
            return Err(self.invalid("complete"));
        }
        if !self.is_complete() {
            let pending = self.items.iter().filter(|i| !i.is_completed()).count();
            return Err(InventoryError::InvalidStateTransition {
                entity: "warehouse operation",
                current: format!("{} with {} pending item(s)", self.status, pending),
                action: "complete",
            });
        }
        self.status = OperationStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Cancels a pending or in-progress task.
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<()> {
        if !self.status.can_cancel() {
            return Err(self.invalid("cancel"));
        }
        self.status = OperationStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
        self.cancel_reason = Some(reason.into());
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> InventoryError {
        InventoryError::InvalidStateTransition {
            entity: "warehouse operation",
            current: self.status.to_string(),
            action,
        }
    }
}
