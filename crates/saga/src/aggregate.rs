//! The order fulfillment saga aggregate.

use chrono::{DateTime, Utc};
use common::{
    CommandContext, CorrelationId, CustomerId, OperationId, OrderId, ProductId, ReservationId,
    SagaId, TenantId, UserId, Version, WarehouseId,
};
use inventory::{InventoryError, Reference, ReservationRequest, StockReservation};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};
use crate::order_fulfillment::SagaStepKind;
use crate::state::{SagaStatus, StepStatus};

/// Progress of one order line through fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentItemStatus {
    #[default]
    Pending,
    Reserved,
    Picked,
    Shipped,
    Released,
}

/// One order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub reserved_quantity: u32,
    pub picked_quantity: u32,
    pub status: FulfillmentItemStatus,
    pub reservation_ids: Vec<ReservationId>,
}

impl FulfillmentItem {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            reserved_quantity: 0,
            picked_quantity: 0,
            status: FulfillmentItemStatus::Pending,
            reservation_ids: Vec::new(),
        }
    }
}

/// Bookkeeping for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaStep {
    pub kind: SagaStepKind,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SagaStep {
    fn new(kind: SagaStepKind) -> Self {
        Self {
            kind,
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

/// A single order's fulfillment workflow.
///
/// Serialized as one document so it can be persisted between `execute` and
/// `complete_picking` and reloaded by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFulfillmentSaga {
    id: SagaId,
    tenant_id: TenantId,
    order_id: OrderId,
    customer_id: CustomerId,
    warehouse_id: WarehouseId,
    items: Vec<FulfillmentItem>,
    status: SagaStatus,
    steps: Vec<SagaStep>,
    pick_operation_id: Option<OperationId>,
    pack_operation_id: Option<OperationId>,
    ship_operation_id: Option<OperationId>,
    created_by: UserId,
    correlation_id: CorrelationId,
    error_message: Option<String>,
    #[serde(default)]
    compensation_errors: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    version: Version,
}

impl OrderFulfillmentSaga {
    /// Creates a pending saga for an order.
    ///
    /// Every line needs a positive quantity and there must be at least one.
    pub fn new(
        ctx: &CommandContext,
        order_id: OrderId,
        customer_id: CustomerId,
        warehouse_id: WarehouseId,
        lines: &[ReservationRequest],
    ) -> Result<Self> {
        if lines.is_empty() {
            return Err(SagaError::EmptyOrder);
        }
        if let Some(bad) = lines.iter().find(|l| l.quantity == 0) {
            return Err(InventoryError::InvalidQuantity {
                quantity: bad.quantity,
            }
            .into());
        }

        let now = Utc::now();
        Ok(Self {
            id: SagaId::new(),
            tenant_id: ctx.tenant_id,
            order_id,
            customer_id,
            warehouse_id,
            items: lines
                .iter()
                .map(|l| FulfillmentItem::new(l.product_id, l.quantity))
                .collect(),
            status: SagaStatus::Pending,
            steps: SagaStepKind::ALL.iter().copied().map(SagaStep::new).collect(),
            pick_operation_id: None,
            pack_operation_id: None,
            ship_operation_id: None,
            created_by: ctx.user_id,
            correlation_id: ctx.correlation_id,
            error_message: None,
            compensation_errors: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: Version::initial(),
        })
    }
}

// Query methods
impl OrderFulfillmentSaga {
    pub fn id(&self) -> SagaId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn items(&self) -> &[FulfillmentItem] {
        &self.items
    }

    pub fn status(&self) -> SagaStatus {
        self.status
    }

    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }

    pub fn pick_operation_id(&self) -> Option<OperationId> {
        self.pick_operation_id
    }

    pub fn pack_operation_id(&self) -> Option<OperationId> {
        self.pack_operation_id
    }

    pub fn ship_operation_id(&self) -> Option<OperationId> {
        self.ship_operation_id
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Failures collected while compensating.
    pub fn compensation_errors(&self) -> &[String] {
        &self.compensation_errors
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Sets the stored version. Called after a successful save.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// The document the saga's reservations and tasks are held for.
    pub fn reference(&self) -> Reference {
        Reference::order(self.order_id)
    }

    /// One reservation request per order line.
    pub fn reservation_requests(&self) -> Vec<ReservationRequest> {
        self.items
            .iter()
            .map(|i| ReservationRequest::new(i.product_id, i.quantity))
            .collect()
    }

    /// Every reservation the saga has created, in line order.
    pub fn reservation_ids(&self) -> Vec<ReservationId> {
        self.items
            .iter()
            .flat_map(|i| i.reservation_ids.iter().copied())
            .collect()
    }

    pub fn step(&self, kind: SagaStepKind) -> Option<&SagaStep> {
        self.steps.iter().find(|s| s.kind == kind)
    }

    pub fn step_status(&self, kind: SagaStepKind) -> StepStatus {
        self.step(kind).map(|s| s.status).unwrap_or_default()
    }

    /// Returns true if every step completed or was skipped.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_done())
    }

    /// The step in progress, otherwise the first pending one.
    pub fn current_step(&self) -> Option<SagaStepKind> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::InProgress)
            .or_else(|| self.steps.iter().find(|s| s.status == StepStatus::Pending))
            .map(|s| s.kind)
    }
}

// Step bookkeeping
impl OrderFulfillmentSaga {
    pub fn start_step(&mut self, kind: SagaStepKind) -> Result<()> {
        let step = self.step_mut(kind, "start", |s| s == StepStatus::Pending)?;
        step.status = StepStatus::InProgress;
        step.started_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Marks a step completed. A pending step may be completed directly.
    pub fn complete_step(&mut self, kind: SagaStepKind) -> Result<()> {
        let step = self.step_mut(kind, "complete", |s| {
            matches!(s, StepStatus::Pending | StepStatus::InProgress)
        })?;
        let now = Utc::now();
        step.started_at.get_or_insert(now);
        step.status = StepStatus::Completed;
        step.finished_at = Some(now);
        self.touch();
        Ok(())
    }

    pub fn skip_step(&mut self, kind: SagaStepKind) -> Result<()> {
        let step = self.step_mut(kind, "skip", |s| s == StepStatus::Pending)?;
        step.status = StepStatus::Skipped;
        step.finished_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Marks a step failed with the given error. Completed steps are left alone.
    pub fn fail_step(&mut self, kind: SagaStepKind, error: impl Into<String>) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.kind == kind)
            && !step.status.is_done()
        {
            step.status = StepStatus::Failed;
            step.finished_at = Some(Utc::now());
            step.error = Some(error.into());
        }
        self.touch();
    }

    fn step_mut(
        &mut self,
        kind: SagaStepKind,
        action: &'static str,
        allowed: impl Fn(StepStatus) -> bool,
    ) -> Result<&mut SagaStep> {
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.kind == kind)
            .ok_or(SagaError::InvalidStepTransition {
                step: kind,
                current: StepStatus::Pending,
                action,
            })?;
        if !allowed(step.status) {
            return Err(SagaError::InvalidStepTransition {
                step: kind,
                current: step.status,
                action,
            });
        }
        Ok(step)
    }
}

// Saga lifecycle
impl OrderFulfillmentSaga {
    /// Pending → InProgress.
    pub fn start(&mut self) -> Result<()> {
        self.transition("start", SagaStatus::can_start, SagaStatus::InProgress)
    }

    /// InProgress → Completed.
    pub fn complete(&mut self) -> Result<()> {
        self.transition(
            "complete",
            |s| *s == SagaStatus::InProgress,
            SagaStatus::Completed,
        )?;
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    /// InProgress → Failed, recording the error.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition("fail", |s| *s == SagaStatus::InProgress, SagaStatus::Failed)?;
        self.error_message = Some(error.into());
        Ok(())
    }

    /// InProgress, Failed or Compensating → Compensating.
    pub fn begin_compensation(&mut self) -> Result<()> {
        self.transition(
            "compensate",
            SagaStatus::can_compensate,
            SagaStatus::Compensating,
        )
    }

    /// Compensating → Compensated, appending any collected failures.
    pub fn finish_compensation(&mut self, errors: &[String]) -> Result<()> {
        self.transition(
            "finish compensating",
            |s| *s == SagaStatus::Compensating,
            SagaStatus::Compensated,
        )?;
        self.compensation_errors.extend_from_slice(errors);
        Ok(())
    }

    fn transition(
        &mut self,
        action: &'static str,
        allowed: impl Fn(&SagaStatus) -> bool,
        to: SagaStatus,
    ) -> Result<()> {
        if !allowed(&self.status) {
            return Err(SagaError::InvalidState {
                saga_id: self.id,
                action,
                actual: self.status,
            });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// Line and task links
impl OrderFulfillmentSaga {
    /// Attaches a reservation to the first unreserved line for its product.
    pub fn record_reservation(&mut self, reservation: &StockReservation) {
        if let Some(item) = self.items.iter_mut().find(|i| {
            i.product_id == reservation.product_id() && i.status == FulfillmentItemStatus::Pending
        }) {
            item.reservation_ids.push(reservation.id());
            item.reserved_quantity += reservation.quantity();
            item.status = FulfillmentItemStatus::Reserved;
        }
        self.touch();
    }

    /// Marks the line holding `reservation_id` as released.
    pub fn record_release(&mut self, reservation_id: ReservationId) {
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|i| i.reservation_ids.contains(&reservation_id))
        {
            item.reserved_quantity = 0;
            item.status = FulfillmentItemStatus::Released;
        }
        self.touch();
    }

    /// Marks every reserved line as fully picked.
    pub fn record_picked(&mut self) {
        for item in &mut self.items {
            if item.status == FulfillmentItemStatus::Reserved {
                item.picked_quantity = item.reserved_quantity;
                item.status = FulfillmentItemStatus::Picked;
            }
        }
        self.touch();
    }

    /// Marks every picked line as shipped.
    pub fn record_shipped(&mut self) {
        for item in &mut self.items {
            if item.status == FulfillmentItemStatus::Picked {
                item.status = FulfillmentItemStatus::Shipped;
            }
        }
        self.touch();
    }

    pub fn set_pick_operation(&mut self, operation_id: OperationId) {
        self.pick_operation_id = Some(operation_id);
        self.touch();
    }

    pub fn set_pack_operation(&mut self, operation_id: OperationId) {
        self.pack_operation_id = Some(operation_id);
        self.touch();
    }

    pub fn set_ship_operation(&mut self, operation_id: OperationId) {
        self.ship_operation_id = Some(operation_id);
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CommandContext {
        CommandContext::new(TenantId::new(), UserId::new())
    }

    fn saga_with(lines: &[ReservationRequest]) -> OrderFulfillmentSaga {
        OrderFulfillmentSaga::new(
            &ctx(),
            OrderId::new(),
            CustomerId::new(),
            WarehouseId::new(),
            lines,
        )
        .unwrap()
    }

    fn saga() -> OrderFulfillmentSaga {
        saga_with(&[
            ReservationRequest::new(ProductId::new(), 2),
            ReservationRequest::new(ProductId::new(), 1),
        ])
    }

    #[test]
    fn test_new_saga() {
        let context = ctx();
        let saga = OrderFulfillmentSaga::new(
            &context,
            OrderId::new(),
            CustomerId::new(),
            WarehouseId::new(),
            &[ReservationRequest::new(ProductId::new(), 3)],
        )
        .unwrap();

        assert_eq!(saga.status(), SagaStatus::Pending);
        assert_eq!(saga.steps().len(), 8);
        assert_eq!(saga.current_step(), Some(SagaStepKind::ValidateStock));
        assert_eq!(saga.created_by(), context.user_id);
        assert_eq!(saga.correlation_id(), context.correlation_id);
        assert_eq!(saga.reference().kind, "order");
        assert!(!saga.is_complete());
    }

    #[test]
    fn test_empty_order_rejected() {
        let result = OrderFulfillmentSaga::new(
            &ctx(),
            OrderId::new(),
            CustomerId::new(),
            WarehouseId::new(),
            &[],
        );
        assert!(matches!(result, Err(SagaError::EmptyOrder)));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = OrderFulfillmentSaga::new(
            &ctx(),
            OrderId::new(),
            CustomerId::new(),
            WarehouseId::new(),
            &[ReservationRequest::new(ProductId::new(), 0)],
        );
        assert!(matches!(
            result,
            Err(SagaError::Inventory(InventoryError::InvalidQuantity { .. }))
        ));
    }

    #[test]
    fn test_step_bookkeeping() {
        let mut saga = saga();

        saga.start_step(SagaStepKind::ValidateStock).unwrap();
        assert_eq!(saga.current_step(), Some(SagaStepKind::ValidateStock));
        assert!(saga.start_step(SagaStepKind::ValidateStock).is_err());

        saga.complete_step(SagaStepKind::ValidateStock).unwrap();
        assert_eq!(saga.current_step(), Some(SagaStepKind::ReserveStock));

        // Completing a pending step directly is allowed.
        saga.complete_step(SagaStepKind::ReserveStock).unwrap();
        assert!(saga.complete_step(SagaStepKind::ReserveStock).is_err());

        saga.start_step(SagaStepKind::CreatePickingTask).unwrap();
        saga.fail_step(SagaStepKind::CreatePickingTask, "no location");
        let step = saga.step(SagaStepKind::CreatePickingTask).unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error.as_deref(), Some("no location"));
    }

    #[test]
    fn test_fail_step_leaves_completed_steps() {
        let mut saga = saga();
        saga.complete_step(SagaStepKind::ValidateStock).unwrap();
        saga.fail_step(SagaStepKind::ValidateStock, "late");
        assert_eq!(
            saga.step_status(SagaStepKind::ValidateStock),
            StepStatus::Completed
        );
    }

    #[test]
    fn test_is_complete_counts_skipped() {
        let mut saga = saga();
        for kind in SagaStepKind::ALL {
            if kind == SagaStepKind::SendNotification {
                saga.skip_step(kind).unwrap();
            } else {
                saga.complete_step(kind).unwrap();
            }
        }
        assert!(saga.is_complete());
        assert_eq!(saga.current_step(), None);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut saga = saga();
        assert!(saga.complete().is_err());

        saga.start().unwrap();
        assert!(saga.start().is_err());

        saga.fail("boom").unwrap();
        assert_eq!(saga.status(), SagaStatus::Failed);
        assert_eq!(saga.error_message(), Some("boom"));

        saga.begin_compensation().unwrap();
        saga.finish_compensation(&["release failed".to_string()])
            .unwrap();
        assert_eq!(saga.status(), SagaStatus::Compensated);
        assert_eq!(saga.compensation_errors(), ["release failed"]);

        assert!(matches!(
            saga.begin_compensation(),
            Err(SagaError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_completed_saga_cannot_compensate() {
        let mut saga = saga();
        saga.start().unwrap();
        saga.complete().unwrap();
        assert!(saga.completed_at().is_some());
        assert!(saga.begin_compensation().is_err());
    }

    #[test]
    fn test_reservation_tracking() {
        let product = ProductId::new();
        let mut saga = saga_with(&[ReservationRequest::new(product, 4)]);
        let reservation = StockReservation::new(
            saga.tenant_id(),
            product,
            saga.warehouse_id(),
            saga.reference(),
            4,
            saga.created_by(),
        )
        .unwrap();

        saga.record_reservation(&reservation);
        assert_eq!(saga.reservation_ids(), vec![reservation.id()]);
        assert_eq!(saga.items()[0].reserved_quantity, 4);
        assert_eq!(saga.items()[0].status, FulfillmentItemStatus::Reserved);

        saga.record_picked();
        assert_eq!(saga.items()[0].picked_quantity, 4);
        saga.record_shipped();
        assert_eq!(saga.items()[0].status, FulfillmentItemStatus::Shipped);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut saga = saga();
        saga.start().unwrap();
        saga.complete_step(SagaStepKind::ValidateStock).unwrap();

        let json = serde_json::to_value(&saga).unwrap();
        assert_eq!(json["status"], "in_progress");
        let back: OrderFulfillmentSaga = serde_json::from_value(json).unwrap();
        assert_eq!(back, saga);
    }
}
