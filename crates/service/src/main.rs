//! Runs one order through the engine against the in-memory stores.
//!
//! Useful as a smoke test of the wiring: configuration, logging, metrics,
//! both saga phases, and the resulting ledger.

use common::{ProductId, TenantId, UserId};
use inventory::Warehouse;
use service::commands::{CompletePicking, FulfillOrder, OrderLine, ReceiveStock, RequestContext};
use service::config::Config;
use service::{Result, create_default_service, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    telemetry::init_tracing(&config)?;

    // 2. Install Prometheus metrics recorder
    let metrics_handle = telemetry::install_metrics_recorder()?;

    // 3. Create the service and a warehouse to work in
    let (service, stores) = create_default_service(&config);
    let tenant_id = TenantId::new();
    let warehouse = Warehouse::new(tenant_id, "WH-DEMO", "Demo warehouse");
    let warehouse_id = warehouse.id.to_string();
    stores.warehouses.add(warehouse).await;

    let context = RequestContext::new(tenant_id.to_string(), UserId::new().to_string());

    // 4. Receive stock for two products
    let products = [ProductId::new().to_string(), ProductId::new().to_string()];
    for product_id in &products {
        service
            .receive_stock(ReceiveStock {
                context: context.clone(),
                product_id: product_id.clone(),
                warehouse_id: warehouse_id.clone(),
                quantity: 20,
                unit_cost_cents: 450,
            })
            .await?;
    }

    // 5. Phase 1: reserve and create the pick task
    let saga = service
        .fulfill_order(FulfillOrder {
            context: context.clone(),
            order_id: common::OrderId::new().to_string(),
            customer_id: common::CustomerId::new().to_string(),
            warehouse_id: warehouse_id.clone(),
            items: vec![
                OrderLine::new(products[0].clone(), 3),
                OrderLine::new(products[1].clone(), 1),
            ],
        })
        .await?;
    tracing::info!(saga_id = %saga.id(), status = %saga.status(), "order waiting for picking");

    // 6. Phase 2: picking finished
    let saga = service
        .complete_picking(CompletePicking {
            context,
            saga_id: saga.id().to_string(),
        })
        .await?;
    tracing::info!(saga_id = %saga.id(), status = %saga.status(), "order fulfilled");

    for item in saga.items() {
        if let Some(entry) = stores
            .inventory
            .get(tenant_id, item.product_id, saga.warehouse_id())
            .await
        {
            tracing::info!(
                product_id = %item.product_id,
                on_hand = entry.quantity(),
                reserved = entry.reserved_qty(),
                "stock after fulfillment"
            );
        }
    }

    tracing::info!(
        events = stores.publisher.event_count().await,
        "published events"
    );
    tracing::debug!(metrics = %metrics_handle.render(), "metrics snapshot");
    Ok(())
}
