//! Integration tests for the reservation manager.
//!
//! These tests drive reservations through the in-memory stores and verify
//! that the ledger and the reservation records stay in step, including under
//! concurrent writers.

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{CommandContext, OrderId, ProductId, TenantId, UserId, WarehouseId};
use events::InMemoryPublisher;
use inventory::{
    InMemoryInventoryRepository, InMemoryReservationRepository, InventoryError, InventoryItem,
    Reference, ReservationConfig, ReservationManager, ReservationRequest, ReservationStatus,
};

type Manager =
    ReservationManager<InMemoryInventoryRepository, InMemoryReservationRepository, InMemoryPublisher>;

struct TestHarness {
    manager: Manager,
    ctx: CommandContext,
    warehouse_id: WarehouseId,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(ReservationConfig::default())
    }

    fn with_config(config: ReservationConfig) -> Self {
        let manager = ReservationManager::new(
            InMemoryInventoryRepository::new(),
            InMemoryReservationRepository::new(),
            InMemoryPublisher::new(),
        )
        .with_config(config);

        Self {
            manager,
            ctx: CommandContext::new(TenantId::new(), UserId::new()),
            warehouse_id: WarehouseId::new(),
        }
    }

    async fn stock(&self, on_hand: u32) -> ProductId {
        let product_id = ProductId::new();
        self.manager
            .inventory()
            .seed(InventoryItem::with_quantity(
                self.ctx.tenant_id,
                product_id,
                self.warehouse_id,
                on_hand,
            ))
            .await;
        product_id
    }

    async fn item(&self, product_id: ProductId) -> InventoryItem {
        self.manager
            .inventory()
            .get(self.ctx.tenant_id, product_id, self.warehouse_id)
            .await
            .unwrap()
    }

    fn order() -> Reference {
        Reference::order(OrderId::new())
    }
}

mod reserve {
    use super::*;

    #[tokio::test]
    async fn full_stock_then_nothing_left() {
        let h = TestHarness::new();
        let product = h.stock(10).await;

        h.manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 10)],
            )
            .await
            .unwrap();

        let item = h.item(product).await;
        assert_eq!(item.reserved_qty(), 10);
        assert_eq!(item.available_qty(), 0);

        let err = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 1)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { .. }));
    }

    #[tokio::test]
    async fn rejects_zero_and_excess_quantities() {
        let h = TestHarness::new();
        let product = h.stock(5).await;

        let zero = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 0)],
            )
            .await;
        assert!(matches!(
            zero,
            Err(InventoryError::InvalidQuantity { quantity: 0 })
        ));

        let excess = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 6)],
            )
            .await;
        assert!(matches!(
            excess,
            Err(InventoryError::InsufficientStock {
                requested: 6,
                available: 5,
                ..
            })
        ));

        assert_eq!(h.item(product).await.reserved_qty(), 0);
        assert!(h.manager.reservations().all().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let h = TestHarness::new();
        let err = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(ProductId::new(), 1)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn partial_failure_returns_created_reservations() {
        let h = TestHarness::new();
        let first = h.stock(5).await;
        let second = h.stock(5).await;
        h.manager.inventory().set_fail_on_update(second, true).await;

        let err = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[
                    ReservationRequest::new(first, 2),
                    ReservationRequest::new(second, 2),
                ],
            )
            .await
            .unwrap_err();

        match err {
            InventoryError::PartialReservation { reserved, source } => {
                assert_eq!(reserved.len(), 1);
                assert_eq!(reserved[0].product_id(), first);
                assert!(reserved[0].is_active());
                assert!(matches!(*source, InventoryError::Repository(_)));
            }
            other => panic!("expected PartialReservation, got {other:?}"),
        }

        // No rollback inside the step: the first line is still held.
        assert_eq!(h.item(first).await.reserved_qty(), 2);
        assert_eq!(h.item(second).await.reserved_qty(), 0);
    }

    #[tokio::test]
    async fn publishes_stock_reserved_with_context() {
        let h = TestHarness::new();
        let product = h.stock(3).await;

        h.manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 1)],
            )
            .await
            .unwrap();

        let events = h.manager.publisher().events_of_type("stock.reserved").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tenant_id, h.ctx.tenant_id);
        let user_id = h.ctx.user_id.to_string();
        let correlation_id = h.ctx.correlation_id.to_string();
        assert_eq!(events[0].user_id(), Some(user_id.as_str()));
        assert_eq!(events[0].correlation_id(), Some(correlation_id.as_str()));
    }

    #[tokio::test]
    async fn publisher_failure_does_not_fail_reservation() {
        let h = TestHarness::new();
        let product = h.stock(3).await;
        h.manager.publisher().set_fail_on_publish(true);

        let reserved = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 2)],
            )
            .await
            .unwrap();

        assert_eq!(reserved.len(), 1);
        assert_eq!(h.manager.publisher().event_count().await, 0);
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn reserve_then_release_restores_ledger() {
        let h = TestHarness::new();
        let product = h.stock(10).await;
        let before = h.item(product).await;

        let reserved = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 4)],
            )
            .await
            .unwrap();

        let released = h
            .manager
            .release_reservation(&h.ctx, reserved[0].id(), "cancelled")
            .await
            .unwrap();
        assert_eq!(released.status(), ReservationStatus::Released);
        assert_eq!(released.release_reason(), Some("cancelled"));

        let after = h.item(product).await;
        assert_eq!(after.quantity(), before.quantity());
        assert_eq!(after.reserved_qty(), before.reserved_qty());
        assert_eq!(after.available_qty(), before.available_qty());

        let events = h
            .manager
            .publisher()
            .events_of_type("reservation.released")
            .await;
        assert_eq!(events[0].payload["data"]["reason"], "cancelled");
    }

    #[tokio::test]
    async fn commit_deducts_stock() {
        let h = TestHarness::new();
        let product = h.stock(10).await;

        let reserved = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 4)],
            )
            .await
            .unwrap();

        let committed = h
            .manager
            .commit_reservation(&h.ctx, reserved[0].id())
            .await
            .unwrap();
        assert_eq!(committed.status(), ReservationStatus::Fulfilled);

        let item = h.item(product).await;
        assert_eq!(item.quantity(), 6);
        assert_eq!(item.reserved_qty(), 0);
        assert_eq!(item.available_qty(), 6);
    }

    #[tokio::test]
    async fn terminal_reservations_cannot_change() {
        let h = TestHarness::new();
        let product = h.stock(10).await;

        let reserved = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 3)],
            )
            .await
            .unwrap();
        let id = reserved[0].id();

        h.manager
            .release_reservation(&h.ctx, id, "cancelled")
            .await
            .unwrap();

        let commit = h.manager.commit_reservation(&h.ctx, id).await;
        assert!(matches!(
            commit,
            Err(InventoryError::InvalidStateTransition { .. })
        ));
        let again = h.manager.release_reservation(&h.ctx, id, "again").await;
        assert!(again.is_err());

        // The second release did not hand back units twice.
        let item = h.item(product).await;
        assert_eq!(item.reserved_qty(), 0);
        assert_eq!(item.quantity(), 10);
        assert_eq!(
            h.manager.find_reservation(id).await.unwrap().status(),
            ReservationStatus::Released
        );
    }

    #[tokio::test]
    async fn expiry_releases_units() {
        let h = TestHarness::with_config(ReservationConfig {
            reservation_ttl: Some(Duration::minutes(15)),
            ..ReservationConfig::default()
        });
        let product = h.stock(10).await;

        let reserved = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 5)],
            )
            .await
            .unwrap();
        let id = reserved[0].id();

        let early = h.manager.expire_reservation(&h.ctx, id, Utc::now()).await;
        assert!(early.is_err());
        assert_eq!(h.item(product).await.reserved_qty(), 5);

        let expired = h
            .manager
            .expire_reservation(&h.ctx, id, Utc::now() + Duration::minutes(16))
            .await
            .unwrap();
        assert_eq!(expired.status(), ReservationStatus::Expired);
        assert_eq!(h.item(product).await.reserved_qty(), 0);
        assert_eq!(
            h.manager
                .publisher()
                .events_of_type("reservation.expired")
                .await
                .len(),
            1
        );
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn conflicts_are_retried() {
        let h = TestHarness::new();
        let product = h.stock(10).await;
        h.manager.inventory().force_conflicts(2).await;

        h.manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 3)],
            )
            .await
            .unwrap();

        assert_eq!(h.item(product).await.reserved_qty(), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let h = TestHarness::with_config(ReservationConfig {
            max_update_retries: 1,
            ..ReservationConfig::default()
        });
        let product = h.stock(10).await;
        h.manager.inventory().force_conflicts(2).await;

        let err = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 3)],
            )
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(h.item(product).await.reserved_qty(), 0);
        assert!(h.manager.reservations().all().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_over_reserve() {
        const ON_HAND: u32 = 10;
        const CALLERS: usize = 25;

        let h = TestHarness::with_config(ReservationConfig {
            max_update_retries: CALLERS as u32,
            ..ReservationConfig::default()
        });
        let product = h.stock(ON_HAND).await;
        let ctx = h.ctx;
        let warehouse_id = h.warehouse_id;
        let manager = Arc::new(h.manager);

        let mut handles = Vec::with_capacity(CALLERS);
        for _ in 0..CALLERS {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager
                    .reserve_stock(
                        &ctx,
                        warehouse_id,
                        &TestHarness::order(),
                        &[ReservationRequest::new(product, 1)],
                    )
                    .await
            }));
        }

        let mut succeeded = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(InventoryError::InsufficientStock { .. }) => insufficient += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(succeeded, ON_HAND as usize);
        assert_eq!(insufficient, CALLERS - ON_HAND as usize);

        let item = manager
            .inventory()
            .get(ctx.tenant_id, product, warehouse_id)
            .await
            .unwrap();
        assert_eq!(item.reserved_qty(), ON_HAND);
        assert_eq!(item.available_qty(), 0);
        assert!(item.is_consistent());
        assert_eq!(
            manager
                .reservations()
                .count_with_status(ReservationStatus::Active)
                .await,
            ON_HAND as usize
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_releases_settle_once() {
        const CALLERS: usize = 8;

        let h = TestHarness::with_config(ReservationConfig {
            max_update_retries: 4 * CALLERS as u32,
            ..ReservationConfig::default()
        });
        let product = h.stock(10).await;
        let reserved = h
            .manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 3)],
            )
            .await
            .unwrap();
        // A second holder keeps enough units reserved for a racing release
        // to get past the ledger before losing on the record.
        h.manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 3)],
            )
            .await
            .unwrap();

        let ctx = h.ctx;
        let warehouse_id = h.warehouse_id;
        let reservation_id = reserved[0].id();
        let manager = Arc::new(h.manager);

        let mut handles = Vec::with_capacity(CALLERS);
        for _ in 0..CALLERS {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager
                    .release_reservation(&ctx, reservation_id, "cancelled")
                    .await
            }));
        }

        let mut released = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                released += 1;
            }
        }
        assert_eq!(released, 1);

        let item = manager
            .inventory()
            .get(ctx.tenant_id, product, warehouse_id)
            .await
            .unwrap();
        assert_eq!(item.reserved_qty(), 3);
        assert_eq!(item.available_qty(), 7);
        assert!(item.is_consistent());
    }
}

mod corrections {
    use super::*;
    use inventory::Money;

    #[tokio::test]
    async fn adjustment_below_reserved_is_rejected() {
        let h = TestHarness::new();
        let product = h.stock(10).await;
        h.manager
            .reserve_stock(
                &h.ctx,
                h.warehouse_id,
                &TestHarness::order(),
                &[ReservationRequest::new(product, 8)],
            )
            .await
            .unwrap();

        let err = h
            .manager
            .adjust_stock(&h.ctx, product, h.warehouse_id, -3, "damaged")
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidAdjustment(_)));

        let item = h
            .manager
            .adjust_stock(&h.ctx, product, h.warehouse_id, -2, "damaged")
            .await
            .unwrap();
        assert_eq!(item.quantity(), 8);
        assert_eq!(item.available_qty(), 0);
    }

    #[tokio::test]
    async fn receipts_average_cost() {
        let h = TestHarness::new();
        let product = h.stock(0).await;

        h.manager
            .receive_stock(&h.ctx, product, h.warehouse_id, 10, Money::from_cents(100))
            .await
            .unwrap();
        let item = h
            .manager
            .receive_stock(&h.ctx, product, h.warehouse_id, 10, Money::from_cents(200))
            .await
            .unwrap();

        assert_eq!(item.quantity(), 20);
        assert_eq!(item.unit_cost(), Money::from_cents(150));
    }
}
