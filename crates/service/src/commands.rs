//! Commands accepted by the fulfillment service.
//!
//! Commands arrive with raw string identifiers (from a queue or an HTTP body)
//! and are parsed into typed ids before anything touches the engine.

use common::{
    CommandContext, CorrelationId, CustomerId, OrderId, ProductId, ReservationId, SagaId,
    TenantId, UserId, WarehouseId,
};
use inventory::ReservationRequest;
use saga::SagaError;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who is acting, for which tenant, under which correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub tenant_id: String,
    pub user_id: String,
    /// A fresh correlation id is generated when absent.
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl RequestContext {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Parses the raw ids into a command context.
    ///
    /// A malformed user id is reported as [`SagaError::InvalidUserId`].
    pub fn parse(&self) -> Result<CommandContext> {
        let tenant_id = TenantId::parse(&self.tenant_id)?;
        let user_id = UserId::parse(&self.user_id)
            .map_err(|_| SagaError::InvalidUserId(self.user_id.clone()))?;

        let ctx = CommandContext::new(tenant_id, user_id);
        Ok(match &self.correlation_id {
            Some(raw) => ctx.with_correlation_id(CorrelationId::parse(raw)?),
            None => ctx,
        })
    }
}

/// One order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Starts fulfillment of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillOrder {
    pub context: RequestContext,
    pub order_id: String,
    pub customer_id: String,
    pub warehouse_id: String,
    pub items: Vec<OrderLine>,
}

/// Parsed form of [`FulfillOrder`].
#[derive(Debug, Clone)]
pub struct ParsedFulfillOrder {
    pub ctx: CommandContext,
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub warehouse_id: WarehouseId,
    pub items: Vec<ReservationRequest>,
}

impl FulfillOrder {
    /// Parses every id. A malformed order id is reported as
    /// [`SagaError::InvalidReference`].
    pub fn parse(&self) -> Result<ParsedFulfillOrder> {
        let ctx = self.context.parse()?;
        let order_id = OrderId::parse(&self.order_id)
            .map_err(|_| SagaError::InvalidReference(self.order_id.clone()))?;
        let items = self
            .items
            .iter()
            .map(|line| -> Result<ReservationRequest> {
                Ok(ReservationRequest::new(
                    ProductId::parse(&line.product_id)?,
                    line.quantity,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ParsedFulfillOrder {
            ctx,
            order_id,
            customer_id: CustomerId::parse(&self.customer_id)?,
            warehouse_id: WarehouseId::parse(&self.warehouse_id)?,
            items,
        })
    }
}

/// Reports that picking finished for a waiting saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletePicking {
    pub context: RequestContext,
    pub saga_id: String,
}

impl CompletePicking {
    pub fn parse(&self) -> Result<(CommandContext, SagaId)> {
        Ok((self.context.parse()?, SagaId::parse(&self.saga_id)?))
    }
}

/// Rolls back a saga's reservations and pick task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensateSaga {
    pub context: RequestContext,
    pub saga_id: String,
}

impl CompensateSaga {
    pub fn parse(&self) -> Result<(CommandContext, SagaId)> {
        Ok((self.context.parse()?, SagaId::parse(&self.saga_id)?))
    }
}

/// Books incoming goods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub context: RequestContext,
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: u32,
    pub unit_cost_cents: i64,
}

/// Applies a manual signed correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub context: RequestContext,
    pub product_id: String,
    pub warehouse_id: String,
    pub delta: i64,
    pub reason: String,
}

/// Records a physical count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountStock {
    pub context: RequestContext,
    pub product_id: String,
    pub warehouse_id: String,
    pub counted: u32,
}

/// Releases a single reservation outside any saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReservation {
    pub context: RequestContext,
    pub reservation_id: String,
    pub reason: String,
}

/// Expires a reservation whose lifetime has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireReservation {
    pub context: RequestContext,
    pub reservation_id: String,
}

/// Parses a product and warehouse pair, the key of a ledger entry.
pub(crate) fn parse_stock_key(product_id: &str, warehouse_id: &str) -> Result<(ProductId, WarehouseId)> {
    Ok((ProductId::parse(product_id)?, WarehouseId::parse(warehouse_id)?))
}

pub(crate) fn parse_reservation_id(raw: &str) -> Result<ReservationId> {
    Ok(ReservationId::parse(raw)?)
}
