//! Order fulfillment saga definition.

use serde::{Deserialize, Serialize};

/// The saga type identifier for order fulfillment.
pub const SAGA_TYPE: &str = "OrderFulfillment";

/// Release reason recorded on reservations given back by compensation.
pub const COMPENSATION_REASON: &str = "saga_compensation";

/// Default priority of the pick task created in phase 1.
pub const DEFAULT_PICK_PRIORITY: u8 = 7;

/// The fixed steps of the fulfillment saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStepKind {
    ValidateStock,
    ReserveStock,
    CreatePickingTask,
    WaitForPicking,
    PackItems,
    ShipOrder,
    CommitReservations,
    SendNotification,
}

impl SagaStepKind {
    /// Every step, in order.
    pub const ALL: [SagaStepKind; 8] = [
        SagaStepKind::ValidateStock,
        SagaStepKind::ReserveStock,
        SagaStepKind::CreatePickingTask,
        SagaStepKind::WaitForPicking,
        SagaStepKind::PackItems,
        SagaStepKind::ShipOrder,
        SagaStepKind::CommitReservations,
        SagaStepKind::SendNotification,
    ];

    /// Returns the step name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStepKind::ValidateStock => "validate_stock",
            SagaStepKind::ReserveStock => "reserve_stock",
            SagaStepKind::CreatePickingTask => "create_picking_task",
            SagaStepKind::WaitForPicking => "wait_for_picking",
            SagaStepKind::PackItems => "pack_items",
            SagaStepKind::ShipOrder => "ship_order",
            SagaStepKind::CommitReservations => "commit_reservations",
            SagaStepKind::SendNotification => "send_notification",
        }
    }

    /// Returns true for steps run by `execute`, false for `complete_picking`.
    pub fn is_phase_one(&self) -> bool {
        matches!(
            self,
            SagaStepKind::ValidateStock
                | SagaStepKind::ReserveStock
                | SagaStepKind::CreatePickingTask
        )
    }
}

impl std::fmt::Display for SagaStepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
