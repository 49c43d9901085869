use common::{CommandContext, OrderId, ProductId, TenantId, UserId, WarehouseId};
use criterion::{Criterion, criterion_group, criterion_main};
use events::InMemoryPublisher;
use inventory::{
    InMemoryInventoryRepository, InMemoryReservationRepository, InventoryItem, Money, Reference,
    ReservationManager, ReservationRequest,
};

fn bench_ledger_reserve_release(c: &mut Criterion) {
    let mut item =
        InventoryItem::with_quantity(TenantId::new(), ProductId::new(), WarehouseId::new(), 1_000);

    c.bench_function("ledger/reserve_release", |b| {
        b.iter(|| {
            item.reserve(5).unwrap();
            item.release_reservation(5);
        });
    });
}

fn bench_ledger_receive(c: &mut Criterion) {
    let mut item = InventoryItem::new(TenantId::new(), ProductId::new(), WarehouseId::new());

    c.bench_function("ledger/receive", |b| {
        b.iter(|| {
            item.receive(1, Money::from_cents(1999)).unwrap();
        });
    });
}

fn bench_reserve_and_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = CommandContext::new(TenantId::new(), UserId::new());
    let product_id = ProductId::new();
    let warehouse_id = WarehouseId::new();

    let inventory = InMemoryInventoryRepository::new();
    rt.block_on(inventory.seed(InventoryItem::with_quantity(
        ctx.tenant_id,
        product_id,
        warehouse_id,
        1_000,
    )));
    let manager = ReservationManager::new(
        inventory,
        InMemoryReservationRepository::new(),
        InMemoryPublisher::new(),
    );

    c.bench_function("manager/reserve_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let reserved = manager
                    .reserve_stock(
                        &ctx,
                        warehouse_id,
                        &Reference::order(OrderId::new()),
                        &[ReservationRequest::new(product_id, 2)],
                    )
                    .await
                    .unwrap();
                manager
                    .release_reservation(&ctx, reserved[0].id(), "bench")
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_ledger_reserve_release,
    bench_ledger_receive,
    bench_reserve_and_release
);
criterion_main!(benches);
