//! Command handling for the fulfillment engine.
//!
//! [`FulfillmentService`] is the single entry point for callers: it parses raw
//! commands, builds sagas and routes manual inventory corrections. The
//! [`config`] and [`telemetry`] modules load settings from the environment and
//! install structured logging and Prometheus metrics.

pub mod commands;
pub mod config;
pub mod error;
pub mod telemetry;

use chrono::Utc;
use common::SagaId;
use events::{EventPublisher, InMemoryPublisher};
use inventory::{
    InMemoryInventoryRepository, InMemoryOperationRepository, InMemoryReservationRepository,
    InMemoryWarehouseRepository, InventoryItem, InventoryRepository, Money, OperationRepository,
    ReservationManager, ReservationRepository, StockReservation,
};
use saga::{
    CompensationReport, InMemorySagaRepository, LocationAssigner, OrderFulfillmentSaga,
    SagaOrchestrator, SagaRepository, WarehouseLocationAssigner,
};

use crate::commands::{
    AdjustStock, CompensateSaga, CompletePicking, CountStock, ExpireReservation, FulfillOrder,
    ReceiveStock, ReleaseReservation, RequestContext, parse_reservation_id, parse_stock_key,
};
use crate::config::Config;

pub use error::{ErrorKind, Result, ServiceError};

/// Routes fulfillment and inventory commands to the engine.
pub struct FulfillmentService<I, R, P, O, L, S>
where
    I: InventoryRepository,
    R: ReservationRepository,
    P: EventPublisher,
    O: OperationRepository,
    L: LocationAssigner,
    S: SagaRepository,
{
    orchestrator: SagaOrchestrator<I, R, P, O, L, S>,
}

impl<I, R, P, O, L, S> FulfillmentService<I, R, P, O, L, S>
where
    I: InventoryRepository,
    R: ReservationRepository,
    P: EventPublisher,
    O: OperationRepository,
    L: LocationAssigner,
    S: SagaRepository,
{
    pub fn new(orchestrator: SagaOrchestrator<I, R, P, O, L, S>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &SagaOrchestrator<I, R, P, O, L, S> {
        &self.orchestrator
    }

    fn reservations(&self) -> &ReservationManager<I, R, P> {
        self.orchestrator.reservations()
    }

    /// Starts fulfillment of an order and runs it up to picking.
    ///
    /// Returns the saga waiting for picking. On failure the saga has already
    /// been persisted as failed or compensated.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn fulfill_order(&self, cmd: FulfillOrder) -> Result<OrderFulfillmentSaga> {
        let parsed = cmd.parse()?;
        let mut saga = OrderFulfillmentSaga::new(
            &parsed.ctx,
            parsed.order_id,
            parsed.customer_id,
            parsed.warehouse_id,
            &parsed.items,
        )?;

        self.orchestrator.execute(&parsed.ctx, &mut saga).await?;
        Ok(saga)
    }

    /// Drives a waiting saga through packing, shipping and commit.
    #[tracing::instrument(skip(self, cmd), fields(saga_id = %cmd.saga_id))]
    pub async fn complete_picking(&self, cmd: CompletePicking) -> Result<OrderFulfillmentSaga> {
        let (ctx, saga_id) = cmd.parse()?;
        Ok(self.orchestrator.complete_picking(&ctx, saga_id).await?)
    }

    /// Rolls back a saga that has not completed.
    #[tracing::instrument(skip(self, cmd), fields(saga_id = %cmd.saga_id))]
    pub async fn compensate_saga(&self, cmd: CompensateSaga) -> Result<CompensationReport> {
        let (ctx, saga_id) = cmd.parse()?;
        Ok(self.orchestrator.compensate(&ctx, saga_id).await?)
    }

    /// Loads a saga, hiding other tenants' sagas.
    pub async fn get_saga(
        &self,
        context: &RequestContext,
        saga_id: &str,
    ) -> Result<OrderFulfillmentSaga> {
        let ctx = context.parse()?;
        let saga_id = SagaId::parse(saga_id)?;
        let saga = self.orchestrator.get_saga(saga_id).await?;
        if saga.tenant_id() != ctx.tenant_id {
            return Err(saga::SagaError::NotFound(saga_id).into());
        }
        Ok(saga)
    }

    pub async fn receive_stock(&self, cmd: ReceiveStock) -> Result<InventoryItem> {
        let ctx = cmd.context.parse()?;
        let (product_id, warehouse_id) = parse_stock_key(&cmd.product_id, &cmd.warehouse_id)?;
        Ok(self
            .reservations()
            .receive_stock(
                &ctx,
                product_id,
                warehouse_id,
                cmd.quantity,
                Money::from_cents(cmd.unit_cost_cents),
            )
            .await?)
    }

    pub async fn adjust_stock(&self, cmd: AdjustStock) -> Result<InventoryItem> {
        let ctx = cmd.context.parse()?;
        let (product_id, warehouse_id) = parse_stock_key(&cmd.product_id, &cmd.warehouse_id)?;
        Ok(self
            .reservations()
            .adjust_stock(&ctx, product_id, warehouse_id, cmd.delta, &cmd.reason)
            .await?)
    }

    /// Returns the updated entry and the variance against the booked quantity.
    pub async fn count_stock(&self, cmd: CountStock) -> Result<(InventoryItem, i64)> {
        let ctx = cmd.context.parse()?;
        let (product_id, warehouse_id) = parse_stock_key(&cmd.product_id, &cmd.warehouse_id)?;
        Ok(self
            .reservations()
            .count_stock(&ctx, product_id, warehouse_id, cmd.counted)
            .await?)
    }

    pub async fn release_reservation(&self, cmd: ReleaseReservation) -> Result<StockReservation> {
        let ctx = cmd.context.parse()?;
        let reservation_id = parse_reservation_id(&cmd.reservation_id)?;
        Ok(self
            .reservations()
            .release_reservation(&ctx, reservation_id, &cmd.reason)
            .await?)
    }

    /// Expires a reservation as of now.
    pub async fn expire_reservation(&self, cmd: ExpireReservation) -> Result<StockReservation> {
        let ctx = cmd.context.parse()?;
        let reservation_id = parse_reservation_id(&cmd.reservation_id)?;
        Ok(self
            .reservations()
            .expire_reservation(&ctx, reservation_id, Utc::now())
            .await?)
    }
}

/// Service wired to the in-memory stores.
pub type InMemoryFulfillmentService = FulfillmentService<
    InMemoryInventoryRepository,
    InMemoryReservationRepository,
    InMemoryPublisher,
    InMemoryOperationRepository,
    WarehouseLocationAssigner<InMemoryWarehouseRepository>,
    InMemorySagaRepository,
>;

/// Handles onto the in-memory stores behind a default service, for seeding
/// and inspection.
#[derive(Clone, Default)]
pub struct InMemoryStores {
    pub inventory: InMemoryInventoryRepository,
    pub reservations: InMemoryReservationRepository,
    pub operations: InMemoryOperationRepository,
    pub warehouses: InMemoryWarehouseRepository,
    pub sagas: InMemorySagaRepository,
    pub publisher: InMemoryPublisher,
}

/// Creates a service backed by fresh in-memory stores.
pub fn create_default_service(config: &Config) -> (InMemoryFulfillmentService, InMemoryStores) {
    let stores = InMemoryStores::default();

    let manager = ReservationManager::new(
        stores.inventory.clone(),
        stores.reservations.clone(),
        stores.publisher.clone(),
    )
    .with_config(config.reservation_config());

    let orchestrator = SagaOrchestrator::new(
        manager,
        stores.operations.clone(),
        WarehouseLocationAssigner::new(stores.warehouses.clone()),
        stores.sagas.clone(),
    )
    .with_config(config.saga_config());

    (FulfillmentService::new(orchestrator), stores)
}
