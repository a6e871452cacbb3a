use criterion::{Criterion, criterion_group, criterion_main};
use stock_store::{
    AggregateId, IngredientId, IngredientRecord, InMemoryStockStore, OutboxMessage, StockStore,
    UnitOfWork,
};

fn make_message(aggregate_id: AggregateId) -> OutboxMessage {
    OutboxMessage::builder()
        .event_type("DishPrepared")
        .aggregate_type("Dish")
        .aggregate_id(aggregate_id)
        .payload_raw(serde_json::json!({
            "type": "DishPrepared",
            "data": {
                "dish_id": aggregate_id.to_string(),
                "quantity": 1
            }
        }))
        .build()
        .unwrap()
}

async fn seeded_store(count: usize, quantity: u64) -> (InMemoryStockStore, Vec<IngredientId>) {
    let store = InMemoryStockStore::new();
    let ids: Vec<IngredientId> = (0..count).map(|_| IngredientId::new()).collect();
    let work = ids.iter().fold(UnitOfWork::new(), |work, id| {
        work.insert_ingredient(IngredientRecord::new(*id, "ingredient", quantity))
    });
    store.commit(work).await.unwrap();
    (store, ids)
}

fn bench_single_draw(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, ids) = rt.block_on(seeded_store(1, u64::MAX / 2));

    c.bench_function("stock_store/single_draw", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .commit(UnitOfWork::new().draw(ids[0], 1))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_batch_draw_10_ingredients(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, ids) = rt.block_on(seeded_store(10, u64::MAX / 2));

    c.bench_function("stock_store/batch_draw_10_ingredients", |b| {
        b.iter(|| {
            rt.block_on(async {
                let dish_id = AggregateId::new();
                let work = ids
                    .iter()
                    .fold(UnitOfWork::new(), |work, id| work.draw(*id, 2))
                    .record(make_message(dish_id));
                store.commit(work).await.unwrap();
            });
        });
    });
}

fn bench_rejected_draw(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, ids) = rt.block_on(seeded_store(1, 1));

    c.bench_function("stock_store/rejected_draw", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = store.commit(UnitOfWork::new().draw(ids[0], 2)).await;
                assert!(result.is_err());
            });
        });
    });
}

fn bench_fetch_pending_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStockStore::new();
    rt.block_on(async {
        let dish_id = AggregateId::new();
        let work = (0..1000).fold(UnitOfWork::new(), |work, _| {
            work.record(make_message(dish_id))
        });
        store.commit(work).await.unwrap();
    });

    c.bench_function("stock_store/fetch_pending_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let pending = store.fetch_pending(100).await.unwrap();
                assert_eq!(pending.len(), 100);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_single_draw,
    bench_batch_draw_10_ingredients,
    bench_rejected_draw,
    bench_fetch_pending_100
);
criterion_main!(benches);
