//! Reservation manager: pairs reservation records with ledger mutations.

use chrono::{DateTime, Duration, Utc};
use common::{CommandContext, ProductId, ReservationId, TenantId, WarehouseId};
use events::{EventPublisher, EventPublisherExt};
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};
use crate::events::InventoryEvent;
use crate::ledger::InventoryItem;
use crate::money::Money;
use crate::repository::{InventoryRepository, ReservationRepository};
use crate::reservation::{Reference, StockReservation};

/// Default number of retries for a ledger write that lost a version race.
pub const DEFAULT_MAX_UPDATE_RETRIES: u32 = 3;

/// Tuning for the reservation manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationConfig {
    /// How many times a conflicting ledger write is retried before giving up.
    pub max_update_retries: u32,

    /// Lifetime of new reservations. `None` means they never expire.
    pub reservation_ttl: Option<Duration>,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            max_update_retries: DEFAULT_MAX_UPDATE_RETRIES,
            reservation_ttl: None,
        }
    }
}

/// One line of a reservation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl ReservationRequest {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Creates, releases, commits and expires reservations.
///
/// Every ledger change is a load, mutate, conditional update cycle that is
/// retried on [`InventoryError::ConcurrencyConflict`], so concurrent callers can
/// never jointly reserve more than is available.
///
/// Releases, commits and expiries write the ledger first and claim the
/// reservation record second. If the record write fails the ledger change is
/// undone, so the reservation stays active and its units stay reserved.
pub struct ReservationManager<I, R, P>
where
    I: InventoryRepository,
    R: ReservationRepository,
    P: EventPublisher,
{
    inventory: I,
    reservations: R,
    publisher: P,
    config: ReservationConfig,
}

impl<I, R, P> ReservationManager<I, R, P>
where
    I: InventoryRepository,
    R: ReservationRepository,
    P: EventPublisher,
{
    /// Creates a new manager with the default configuration.
    pub fn new(inventory: I, reservations: R, publisher: P) -> Self {
        Self {
            inventory,
            reservations,
            publisher,
            config: ReservationConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ReservationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReservationConfig {
        &self.config
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    pub fn reservations(&self) -> &R {
        &self.reservations
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Loads a reservation by id.
    pub async fn find_reservation(&self, id: ReservationId) -> Result<StockReservation> {
        self.reservations.find_by_id(id).await
    }

    /// Checks that every line can be served from available stock.
    ///
    /// Lines for the same product are summed before comparing. Stops at the
    /// first product that cannot be served. Nothing is written.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn check_availability(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        items: &[ReservationRequest],
    ) -> Result<()> {
        let mut totals: Vec<ReservationRequest> = Vec::with_capacity(items.len());
        for request in items {
            match totals.iter_mut().find(|t| t.product_id == request.product_id) {
                Some(total) => total.quantity = total.quantity.saturating_add(request.quantity),
                None => totals.push(*request),
            }
        }

        for request in &totals {
            let item = self
                .inventory
                .find_by_product_and_warehouse(tenant_id, request.product_id, warehouse_id)
                .await?;
            if item.available_qty() < request.quantity {
                return Err(InventoryError::InsufficientStock {
                    product_id: request.product_id,
                    warehouse_id,
                    requested: request.quantity,
                    available: item.available_qty(),
                });
            }
        }
        Ok(())
    }

    /// Reserves every line for `reference`, in order.
    ///
    /// Earlier lines are not rolled back when a later one fails. If at least
    /// one reservation was created the error is
    /// [`InventoryError::PartialReservation`], carrying the reservations that
    /// are still active so the caller can release them.
    #[tracing::instrument(skip(self, ctx, reference, items), fields(tenant_id = %ctx.tenant_id, reference = %reference))]
    pub async fn reserve_stock(
        &self,
        ctx: &CommandContext,
        warehouse_id: WarehouseId,
        reference: &Reference,
        items: &[ReservationRequest],
    ) -> Result<Vec<StockReservation>> {
        let mut reserved = Vec::with_capacity(items.len());

        for request in items {
            match self.reserve_one(ctx, warehouse_id, reference, *request).await {
                Ok(reservation) => reserved.push(reservation),
                Err(e) if reserved.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        product_id = %request.product_id,
                        reserved = reserved.len(),
                        error = %e,
                        "reservation stopped partway"
                    );
                    return Err(InventoryError::PartialReservation {
                        reserved,
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(reserved)
    }

    /// Reserves a single line.
    pub async fn reserve_one(
        &self,
        ctx: &CommandContext,
        warehouse_id: WarehouseId,
        reference: &Reference,
        request: ReservationRequest,
    ) -> Result<StockReservation> {
        let mut reservation = StockReservation::new(
            ctx.tenant_id,
            request.product_id,
            warehouse_id,
            reference.clone(),
            request.quantity,
            ctx.user_id,
        )?;
        if let Some(ttl) = self.config.reservation_ttl {
            reservation = reservation.with_expiry(Utc::now() + ttl);
        }

        let quantity = request.quantity;
        self.update_item(
            ctx.tenant_id,
            request.product_id,
            warehouse_id,
            false,
            |item| item.reserve(quantity),
        )
        .await?;

        let reservation = match self.reservations.create(reservation).await {
            Ok(reservation) => reservation,
            Err(e) => {
                // Hand the units back so the ledger matches the stored records.
                if let Err(rollback) = self
                    .update_item(
                        ctx.tenant_id,
                        request.product_id,
                        warehouse_id,
                        false,
                        |item| {
                            item.release_reservation(quantity);
                            Ok(())
                        },
                    )
                    .await
                {
                    tracing::error!(
                        product_id = %request.product_id,
                        quantity,
                        error = %rollback,
                        "failed to return units after reservation record write failed"
                    );
                }
                return Err(e);
            }
        };

        metrics::counter!("reservations_created_total").increment(1);
        tracing::info!(
            reservation_id = %reservation.id(),
            product_id = %reservation.product_id(),
            quantity,
            "stock reserved"
        );
        self.publisher
            .publish_best_effort(ctx, &InventoryEvent::stock_reserved(&reservation))
            .await;

        Ok(reservation)
    }

    /// Gives an active reservation back to available stock.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn release_reservation(
        &self,
        ctx: &CommandContext,
        reservation_id: ReservationId,
        reason: &str,
    ) -> Result<StockReservation> {
        let mut reservation = self.reservations.find_by_id(reservation_id).await?;
        reservation.release(reason)?;

        let quantity = reservation.quantity();
        let reservation = self
            .settle(
                reservation,
                "release",
                |item| item.unreserve(quantity),
                |item| item.reserve(quantity),
            )
            .await?;

        metrics::counter!("reservations_released_total", "reason" => reason.to_string())
            .increment(1);
        tracing::info!(%reservation_id, quantity, reason, "reservation released");
        self.publisher
            .publish_best_effort(
                ctx,
                &InventoryEvent::reservation_released(&reservation, reason),
            )
            .await;

        Ok(reservation)
    }

    /// Converts an active reservation into a permanent stock deduction.
    ///
    /// This is the only path that lowers on-hand stock for an order.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn commit_reservation(
        &self,
        ctx: &CommandContext,
        reservation_id: ReservationId,
    ) -> Result<StockReservation> {
        let mut reservation = self.reservations.find_by_id(reservation_id).await?;
        reservation.fulfill()?;

        let quantity = reservation.quantity();
        let reservation = self
            .settle(
                reservation,
                "commit",
                |item| item.ship(quantity),
                |item| item.return_shipped(quantity),
            )
            .await?;

        metrics::counter!("reservations_committed_total").increment(1);
        tracing::info!(%reservation_id, quantity, "reservation committed");
        self.publisher
            .publish_best_effort(ctx, &InventoryEvent::reservation_committed(&reservation))
            .await;

        Ok(reservation)
    }

    /// Expires an active reservation whose expiry time has passed.
    ///
    /// Intended for an external sweeper; nothing in this crate schedules it.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn expire_reservation(
        &self,
        ctx: &CommandContext,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<StockReservation> {
        let mut reservation = self.reservations.find_by_id(reservation_id).await?;
        reservation.expire(now)?;

        let quantity = reservation.quantity();
        let reservation = self
            .settle(
                reservation,
                "expire",
                |item| item.unreserve(quantity),
                |item| item.reserve(quantity),
            )
            .await?;

        metrics::counter!("reservations_expired_total").increment(1);
        tracing::info!(%reservation_id, quantity, "reservation expired");
        self.publisher
            .publish_best_effort(ctx, &InventoryEvent::reservation_expired(&reservation))
            .await;

        Ok(reservation)
    }

    /// Books incoming goods, creating the ledger entry on first receipt.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn receive_stock(
        &self,
        ctx: &CommandContext,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: u32,
        unit_cost: Money,
    ) -> Result<InventoryItem> {
        let item = self
            .update_item(ctx.tenant_id, product_id, warehouse_id, true, |item| {
                item.receive(quantity, unit_cost)
            })
            .await?;

        tracing::info!(%product_id, quantity, on_hand = item.quantity(), "stock received");
        self.publisher
            .publish_best_effort(
                ctx,
                &InventoryEvent::inventory_received(&item, quantity, unit_cost),
            )
            .await;

        Ok(item)
    }

    /// Applies a signed manual correction.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn adjust_stock(
        &self,
        ctx: &CommandContext,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        delta: i64,
        reason: &str,
    ) -> Result<InventoryItem> {
        let item = self
            .update_item(ctx.tenant_id, product_id, warehouse_id, false, |item| {
                item.adjust(delta, reason)
            })
            .await?;

        tracing::info!(%product_id, delta, reason, "stock adjusted");
        self.publisher
            .publish_best_effort(ctx, &InventoryEvent::inventory_adjusted(&item, delta, reason))
            .await;

        Ok(item)
    }

    /// Replaces the on-hand quantity with a physical count.
    ///
    /// Returns the updated entry and the variance (counted minus booked).
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn count_stock(
        &self,
        ctx: &CommandContext,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        counted: u32,
    ) -> Result<(InventoryItem, i64)> {
        let mut variance = 0;
        let item = self
            .update_item(ctx.tenant_id, product_id, warehouse_id, false, |item| {
                variance = item.count(counted)?;
                Ok(())
            })
            .await?;

        tracing::info!(%product_id, counted, variance, "stock counted");
        if variance != 0 {
            self.publisher
                .publish_best_effort(
                    ctx,
                    &InventoryEvent::inventory_adjusted(&item, variance, "cycle_count"),
                )
                .await;
        }

        Ok((item, variance))
    }

    /// Applies the ledger side of a release, commit or expiry, then stores the
    /// already transitioned reservation.
    ///
    /// When the record write fails (including a version conflict with a
    /// concurrent settle) `undo` reverts the ledger change and the record
    /// error is returned.
    async fn settle<F, U>(
        &self,
        reservation: StockReservation,
        action: &'static str,
        apply: F,
        undo: U,
    ) -> Result<StockReservation>
    where
        F: FnMut(&mut InventoryItem) -> Result<()> + Send,
        U: FnMut(&mut InventoryItem) -> Result<()> + Send,
    {
        let reservation_id = reservation.id();
        let tenant_id = reservation.tenant_id();
        let product_id = reservation.product_id();
        let warehouse_id = reservation.warehouse_id();

        self.update_item(tenant_id, product_id, warehouse_id, false, apply)
            .await?;

        match self.reservations.update(reservation).await {
            Ok(reservation) => Ok(reservation),
            Err(e) => {
                if let Err(rollback) = self
                    .update_item(tenant_id, product_id, warehouse_id, false, undo)
                    .await
                {
                    tracing::error!(
                        %reservation_id,
                        %product_id,
                        action,
                        error = %rollback,
                        "failed to revert ledger after reservation record write failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Load, mutate, conditional update, retried on version conflicts.
    ///
    /// With `create_missing`, an absent entry starts out empty and is
    /// inserted instead of updated.
    async fn update_item<F>(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        create_missing: bool,
        mut mutate: F,
    ) -> Result<InventoryItem>
    where
        F: FnMut(&mut InventoryItem) -> Result<()> + Send,
    {
        let mut retries = 0;

        loop {
            let (mut item, is_new) = match self
                .inventory
                .find_by_product_and_warehouse(tenant_id, product_id, warehouse_id)
                .await
            {
                Ok(item) => (item, false),
                Err(InventoryError::NotFound { .. }) if create_missing => {
                    (InventoryItem::new(tenant_id, product_id, warehouse_id), true)
                }
                Err(e) => return Err(e),
            };

            mutate(&mut item)?;

            let saved = if is_new {
                self.inventory.insert(item).await
            } else {
                self.inventory.update(item).await
            };

            match saved {
                Ok(item) => return Ok(item),
                Err(e) if e.is_conflict() && retries < self.config.max_update_retries => {
                    retries += 1;
                    metrics::counter!("inventory_concurrency_retries_total").increment(1);
                    tracing::debug!(%product_id, retries, "ledger write conflicted, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
