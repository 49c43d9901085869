//! Saga orchestrator for the order fulfillment workflow.

use std::time::Instant;

use common::{CommandContext, OperationId, ReservationId, SagaId};
use events::{DomainEvent, EventPublisher, EventPublisherExt};
use inventory::{
    InventoryError, InventoryEvent, InventoryRepository, OperationItem, OperationRepository,
    OperationStatus, OperationType, ReservationManager, ReservationRepository, ReservationStatus,
    WarehouseOperation,
};

use crate::aggregate::OrderFulfillmentSaga;
use crate::config::SagaConfig;
use crate::error::{Result, SagaError};
use crate::events::SagaEvent;
use crate::order_fulfillment::{COMPENSATION_REASON, SagaStepKind};
use crate::services::{LocationAssigner, SagaRepository};
use crate::state::{SagaStatus, StepStatus};

/// What a compensation run did.
///
/// Individual failures do not stop compensation; they are collected here and
/// stored on the saga.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationReport {
    pub released_reservations: Vec<ReservationId>,
    pub cancelled_operations: Vec<OperationId>,
    pub errors: Vec<String>,
}

impl CompensationReport {
    /// Returns true if every compensating action succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record_error(&mut self, error: String) {
        tracing::warn!(%error, "compensating action failed");
        self.errors.push(error);
    }
}

/// Drives order fulfillment sagas.
///
/// The workflow runs in two phases. [`execute`](Self::execute) validates
/// stock, reserves it and creates the pick task, then leaves the saga
/// `InProgress`. [`complete_picking`](Self::complete_picking) reloads the saga
/// by id once picking is done and packs, ships and commits. Failures in the
/// first phase are compensated; failures in the second are not, since stock
/// may already have left the building.
pub struct SagaOrchestrator<I, R, P, O, L, S>
where
    I: InventoryRepository,
    R: ReservationRepository,
    P: EventPublisher,
    O: OperationRepository,
    L: LocationAssigner,
    S: SagaRepository,
{
    reservations: ReservationManager<I, R, P>,
    operations: O,
    locations: L,
    sagas: S,
    config: SagaConfig,
}

impl<I, R, P, O, L, S> SagaOrchestrator<I, R, P, O, L, S>
where
    I: InventoryRepository,
    R: ReservationRepository,
    P: EventPublisher,
    O: OperationRepository,
    L: LocationAssigner,
    S: SagaRepository,
{
    /// Creates a new orchestrator with the default configuration.
    pub fn new(
        reservations: ReservationManager<I, R, P>,
        operations: O,
        locations: L,
        sagas: S,
    ) -> Self {
        Self {
            reservations,
            operations,
            locations,
            sagas,
            config: SagaConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: SagaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    pub fn reservations(&self) -> &ReservationManager<I, R, P> {
        &self.reservations
    }

    pub fn operations(&self) -> &O {
        &self.operations
    }

    pub fn locations(&self) -> &L {
        &self.locations
    }

    pub fn sagas(&self) -> &S {
        &self.sagas
    }

    /// Loads a saga by id.
    pub async fn get_saga(&self, saga_id: SagaId) -> Result<OrderFulfillmentSaga> {
        self.sagas.find_by_id(saga_id).await
    }

    /// Runs phase 1: validate_stock, reserve_stock, create_picking_task.
    ///
    /// On success the saga is persisted `InProgress`. If validation fails the
    /// saga ends `Failed`; later failures are compensated and the saga ends
    /// `Compensated`. Either way the step error is returned.
    #[tracing::instrument(
        skip(self, ctx, saga),
        fields(saga_id = %saga.id(), order_id = %saga.order_id())
    )]
    pub async fn execute(&self, ctx: &CommandContext, saga: &mut OrderFulfillmentSaga) -> Result<()> {
        metrics::counter!("saga_executions_total").increment(1);
        let started = Instant::now();

        saga.start()?;
        self.persist(saga).await?;
        self.publish(ctx, &SagaEvent::saga_started(saga)).await;
        tracing::info!(items = saga.items().len(), "saga started");

        let result = self.run_phase_one(ctx, saga).await;

        metrics::histogram!("saga_phase_duration_seconds", "phase" => "execute")
            .record(started.elapsed().as_secs_f64());
        result
    }

    /// Runs phase 2 for a persisted saga once picking has finished:
    /// wait_for_picking, pack_items, ship_order, commit_reservations,
    /// send_notification.
    ///
    /// Only valid for an `InProgress` saga whose pick task was created.
    /// Returns the completed saga.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn complete_picking(
        &self,
        ctx: &CommandContext,
        saga_id: SagaId,
    ) -> Result<OrderFulfillmentSaga> {
        let mut saga = self.load_for_tenant(ctx, saga_id).await?;

        if saga.status() != SagaStatus::InProgress
            || saga.step_status(SagaStepKind::CreatePickingTask) != StepStatus::Completed
        {
            return Err(SagaError::InvalidState {
                saga_id,
                action: "complete picking for",
                actual: saga.status(),
            });
        }

        let started = Instant::now();
        let result = self.run_phase_two(ctx, &mut saga).await;
        metrics::histogram!("saga_phase_duration_seconds", "phase" => "complete_picking")
            .record(started.elapsed().as_secs_f64());

        result.map(|()| saga)
    }

    /// Compensates a persisted saga on request, e.g. when the order is
    /// cancelled while waiting for picking.
    ///
    /// A `Completed` saga is rejected, as is any saga whose order has
    /// shipped: its reserved units have physically left and must not return
    /// to available stock. An already `Compensated` saga is left untouched and
    /// an empty report is returned.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn compensate(
        &self,
        ctx: &CommandContext,
        saga_id: SagaId,
    ) -> Result<CompensationReport> {
        let mut saga = self.load_for_tenant(ctx, saga_id).await?;

        match saga.status() {
            SagaStatus::Compensated => {
                tracing::info!(%saga_id, "saga already compensated");
                return Ok(CompensationReport::default());
            }
            status if !status.can_compensate() => {
                return Err(SagaError::InvalidState {
                    saga_id,
                    action: "compensate",
                    actual: status,
                });
            }
            status if saga.step_status(SagaStepKind::ShipOrder) == StepStatus::Completed => {
                return Err(SagaError::InvalidState {
                    saga_id,
                    action: "compensate shipped",
                    actual: status,
                });
            }
            _ => {}
        }

        let report = self.run_compensation(ctx, &mut saga).await?;
        self.persist(&mut saga).await?;
        Ok(report)
    }

    async fn run_phase_one(
        &self,
        ctx: &CommandContext,
        saga: &mut OrderFulfillmentSaga,
    ) -> Result<()> {
        let requests = saga.reservation_requests();

        let step = SagaStepKind::ValidateStock;
        self.begin(saga, step)?;
        if let Err(e) = self
            .reservations
            .check_availability(saga.tenant_id(), saga.warehouse_id(), &requests)
            .await
        {
            return self.abort(ctx, saga, step, e.into(), false).await;
        }
        saga.complete_step(step)?;

        let step = SagaStepKind::ReserveStock;
        self.begin(saga, step)?;
        match self
            .reservations
            .reserve_stock(ctx, saga.warehouse_id(), &saga.reference(), &requests)
            .await
        {
            Ok(reserved) => {
                for reservation in &reserved {
                    saga.record_reservation(reservation);
                }
            }
            Err(InventoryError::PartialReservation { reserved, source }) => {
                for reservation in &reserved {
                    saga.record_reservation(reservation);
                }
                return self
                    .abort(ctx, saga, step, SagaError::Inventory(*source), true)
                    .await;
            }
            Err(e) => return self.abort(ctx, saga, step, e.into(), true).await,
        }
        saga.complete_step(step)?;

        let step = SagaStepKind::CreatePickingTask;
        self.begin(saga, step)?;
        match self.create_pick_task(ctx, saga).await {
            Ok(operation) => saga.set_pick_operation(operation.id()),
            Err(e) => return self.abort(ctx, saga, step, e, true).await,
        }
        saga.complete_step(step)?;

        if let Err(e) = self.persist(saga).await {
            return self.abort(ctx, saga, step, e, true).await;
        }

        tracing::info!(
            saga_id = %saga.id(),
            pick_operation_id = ?saga.pick_operation_id(),
            "saga waiting for picking"
        );
        Ok(())
    }

    async fn run_phase_two(
        &self,
        ctx: &CommandContext,
        saga: &mut OrderFulfillmentSaga,
    ) -> Result<()> {
        let step = SagaStepKind::WaitForPicking;
        self.begin(saga, step)?;
        let picked = match self.finish_pick_task(ctx, saga).await {
            Ok(lines) => lines,
            Err(e) => return self.abort(ctx, saga, step, e.into(), false).await,
        };
        saga.record_picked();
        saga.complete_step(step)?;

        let step = SagaStepKind::PackItems;
        self.begin(saga, step)?;
        match self
            .run_operation(ctx, saga, OperationType::Pack, picked.clone())
            .await
        {
            Ok(operation) => saga.set_pack_operation(operation.id()),
            Err(e) => return self.abort(ctx, saga, step, e.into(), false).await,
        }
        saga.complete_step(step)?;

        // Goods leave here, but on-hand stock only drops when the
        // reservations are committed below.
        let step = SagaStepKind::ShipOrder;
        self.begin(saga, step)?;
        let operation = match self
            .run_operation(ctx, saga, OperationType::Ship, picked)
            .await
        {
            Ok(operation) => operation,
            Err(e) => return self.abort(ctx, saga, step, e.into(), false).await,
        };
        saga.set_ship_operation(operation.id());
        let shipped: Vec<InventoryEvent> = saga
            .items()
            .iter()
            .map(|item| {
                InventoryEvent::inventory_shipped(
                    item.product_id,
                    saga.warehouse_id(),
                    item.picked_quantity,
                    saga.reference(),
                    operation.id(),
                )
            })
            .collect();
        for event in &shipped {
            self.publish(ctx, event).await;
        }
        saga.record_shipped();
        saga.complete_step(step)?;

        let step = SagaStepKind::CommitReservations;
        self.begin(saga, step)?;
        if let Err(e) = self.commit_all(ctx, saga).await {
            return self.abort(ctx, saga, step, e.into(), false).await;
        }
        saga.complete_step(step)?;

        let step = SagaStepKind::SendNotification;
        if self.config.send_notifications {
            saga.complete_step(step)?;
            tracing::info!(
                order_id = %saga.order_id(),
                customer_id = %saga.customer_id(),
                "fulfillment notification sent"
            );
        } else {
            saga.skip_step(step)?;
        }

        saga.complete()?;
        self.persist(saga).await?;

        metrics::counter!("saga_completed_total").increment(1);
        self.publish(ctx, &SagaEvent::saga_completed(saga)).await;
        tracing::info!(saga_id = %saga.id(), "saga completed");
        Ok(())
    }

    /// Releases every active reservation and cancels the pick task.
    ///
    /// Reservations that are no longer active and tasks that already
    /// finished are skipped, so running this twice has no further effect.
    async fn run_compensation(
        &self,
        ctx: &CommandContext,
        saga: &mut OrderFulfillmentSaga,
    ) -> Result<CompensationReport> {
        saga.begin_compensation()?;
        tracing::info!(saga_id = %saga.id(), "compensation started");

        let mut report = CompensationReport::default();

        for reservation_id in saga.reservation_ids() {
            match self.reservations.find_reservation(reservation_id).await {
                Ok(reservation) if !reservation.is_active() => {
                    tracing::debug!(
                        %reservation_id,
                        status = %reservation.status(),
                        "reservation already settled"
                    );
                }
                Ok(_) => match self
                    .reservations
                    .release_reservation(ctx, reservation_id, COMPENSATION_REASON)
                    .await
                {
                    Ok(_) => {
                        saga.record_release(reservation_id);
                        report.released_reservations.push(reservation_id);
                    }
                    Err(e) => {
                        report.record_error(format!("release reservation {reservation_id}: {e}"))
                    }
                },
                Err(e) => report.record_error(format!("load reservation {reservation_id}: {e}")),
            }
        }

        if let Some(operation_id) = saga.pick_operation_id() {
            match self.cancel_operation(ctx, operation_id).await {
                Ok(true) => report.cancelled_operations.push(operation_id),
                Ok(false) => {}
                Err(e) => report.record_error(format!("cancel pick task {operation_id}: {e}")),
            }
        }

        saga.finish_compensation(&report.errors)?;

        metrics::counter!("saga_compensated_total").increment(1);
        if report.is_clean() {
            tracing::info!(
                saga_id = %saga.id(),
                released = report.released_reservations.len(),
                "compensation finished"
            );
        } else {
            metrics::counter!("saga_compensation_failures_total")
                .increment(report.errors.len() as u64);
            tracing::warn!(
                saga_id = %saga.id(),
                released = report.released_reservations.len(),
                failures = report.errors.len(),
                "compensation finished with failures"
            );
        }

        self.publish(
            ctx,
            &SagaEvent::saga_compensated(
                saga,
                report.released_reservations.len(),
                report.errors.clone(),
            ),
        )
        .await;

        Ok(report)
    }

    /// Records a step failure, optionally compensates, persists, and returns
    /// the step error.
    async fn abort(
        &self,
        ctx: &CommandContext,
        saga: &mut OrderFulfillmentSaga,
        step: SagaStepKind,
        error: SagaError,
        compensate: bool,
    ) -> Result<()> {
        let message = error.to_string();
        tracing::warn!(saga_id = %saga.id(), step = step.as_str(), error = %message, "saga step failed");
        metrics::counter!("saga_failed_total", "step" => step.as_str()).increment(1);

        saga.fail_step(step, message.clone());
        if saga.status() == SagaStatus::InProgress {
            saga.fail(message.clone())?;
        }
        self.publish(ctx, &SagaEvent::saga_failed(saga, step, message))
            .await;

        if compensate {
            self.run_compensation(ctx, saga).await?;
        }

        if let Err(persist_error) = self.persist(saga).await {
            tracing::error!(
                saga_id = %saga.id(),
                error = %persist_error,
                "failed to persist saga after step failure"
            );
        }

        Err(error)
    }

    fn begin(&self, saga: &mut OrderFulfillmentSaga, step: SagaStepKind) -> Result<()> {
        tracing::info!(saga_id = %saga.id(), step = step.as_str(), "saga step started");
        saga.start_step(step)
    }

    async fn create_pick_task(
        &self,
        ctx: &CommandContext,
        saga: &OrderFulfillmentSaga,
    ) -> Result<WarehouseOperation> {
        let mut lines = Vec::with_capacity(saga.items().len());
        for item in saga.items() {
            let location = self
                .locations
                .assign(saga.tenant_id(), saga.warehouse_id(), item.product_id)
                .await?;
            lines.push(OperationItem::new(item.product_id, location, item.quantity));
        }

        let operation = WarehouseOperation::new(
            saga.tenant_id(),
            saga.warehouse_id(),
            OperationType::Pick,
            lines,
            ctx.user_id,
        )?
        .with_priority(self.config.pick_priority)
        .with_reference(saga.reference());

        let operation = self.operations.create(operation).await?;
        self.publish(ctx, &InventoryEvent::operation_created(&operation))
            .await;
        Ok(operation)
    }

    /// Closes the pick task if nothing else has, and returns its lines for the
    /// pack and ship tasks.
    async fn finish_pick_task(
        &self,
        ctx: &CommandContext,
        saga: &OrderFulfillmentSaga,
    ) -> inventory::Result<Vec<OperationItem>> {
        let operation_id = saga
            .pick_operation_id()
            .ok_or_else(|| InventoryError::not_found("pick task for saga", saga.id()))?;
        let mut operation = self.operations.find_by_id(operation_id).await?;

        if operation.status() != OperationStatus::Completed {
            if operation.status().can_start() {
                operation.start()?;
            }
            operation.complete_all_items()?;
            operation.complete()?;
            operation = self.operations.update(operation).await?;
            self.publish(ctx, &InventoryEvent::operation_completed(&operation))
                .await;
        }

        Ok(operation
            .items()
            .iter()
            .map(|i| OperationItem::new(i.product_id, i.location_id, i.quantity))
            .collect())
    }

    /// Creates a task and works it to completion.
    async fn run_operation(
        &self,
        ctx: &CommandContext,
        saga: &OrderFulfillmentSaga,
        operation_type: OperationType,
        lines: Vec<OperationItem>,
    ) -> inventory::Result<WarehouseOperation> {
        let operation = WarehouseOperation::new(
            saga.tenant_id(),
            saga.warehouse_id(),
            operation_type,
            lines,
            ctx.user_id,
        )?
        .with_reference(saga.reference());

        let mut operation = self.operations.create(operation).await?;
        self.publish(ctx, &InventoryEvent::operation_created(&operation))
            .await;

        operation.start()?;
        operation.complete_all_items()?;
        operation.complete()?;
        let operation = self.operations.update(operation).await?;
        self.publish(ctx, &InventoryEvent::operation_completed(&operation))
            .await;
        Ok(operation)
    }

    /// Commits every reservation not yet fulfilled.
    async fn commit_all(
        &self,
        ctx: &CommandContext,
        saga: &OrderFulfillmentSaga,
    ) -> inventory::Result<()> {
        for reservation_id in saga.reservation_ids() {
            let reservation = self.reservations.find_reservation(reservation_id).await?;
            if reservation.status() == ReservationStatus::Fulfilled {
                continue;
            }
            self.reservations
                .commit_reservation(ctx, reservation_id)
                .await?;
        }
        Ok(())
    }

    /// Cancels a task unless it already finished. Returns whether it was
    /// cancelled.
    async fn cancel_operation(
        &self,
        ctx: &CommandContext,
        operation_id: OperationId,
    ) -> inventory::Result<bool> {
        let mut operation = self.operations.find_by_id(operation_id).await?;
        if !operation.status().can_cancel() {
            return Ok(false);
        }

        operation.cancel(COMPENSATION_REASON)?;
        let operation = self.operations.update(operation).await?;
        self.publish(
            ctx,
            &InventoryEvent::operation_cancelled(&operation, COMPENSATION_REASON),
        )
        .await;
        Ok(true)
    }

    async fn load_for_tenant(
        &self,
        ctx: &CommandContext,
        saga_id: SagaId,
    ) -> Result<OrderFulfillmentSaga> {
        let saga = self.sagas.find_by_id(saga_id).await?;
        // Another tenant's saga is reported as missing.
        if saga.tenant_id() != ctx.tenant_id {
            return Err(SagaError::NotFound(saga_id));
        }
        Ok(saga)
    }

    async fn persist(&self, saga: &mut OrderFulfillmentSaga) -> Result<()> {
        let version = self.sagas.save(saga).await?;
        saga.set_version(version);
        Ok(())
    }

    async fn publish<E: DomainEvent>(&self, ctx: &CommandContext, event: &E) {
        self.reservations
            .publisher()
            .publish_best_effort(ctx, event)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_is_clean_without_errors() {
        let mut report = CompensationReport::default();
        assert!(report.is_clean());

        report.released_reservations.push(ReservationId::new());
        assert!(report.is_clean());

        report.record_error("release reservation: store offline".to_string());
        assert!(!report.is_clean());
        assert_eq!(report.errors.len(), 1);
    }
}
