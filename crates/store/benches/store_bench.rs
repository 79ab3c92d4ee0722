use common::{CategoryId, Money, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use store::{Category, InMemoryStore, Product, Store, StoreExt};

async fn seed_product(store: &InMemoryStore, quantity: u32) -> Product {
    let category = store
        .insert_category(Category {
            id: CategoryId::new(),
            name: "Electronics".to_string(),
        })
        .await
        .unwrap();
    store
        .insert_product(Product {
            id: ProductId::new(),
            name: "Laptop".to_string(),
            description: None,
            price: Money::from_units(1000),
            quantity,
            category_id: category.id,
        })
        .await
        .unwrap()
}

fn bench_reserve_stock(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let product = rt.block_on(seed_product(&store, u32::MAX / 2));

    c.bench_function("store/reserve_stock", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.reserve_stock(product.id, 1).await.unwrap();
            });
        });
    });
}

fn bench_list_products(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();

    rt.block_on(async {
        for _ in 0..100 {
            seed_product(&store, 10).await;
        }
    });

    c.bench_function("store/list_products_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let products = store.list_products(None).await.unwrap();
                assert_eq!(products.len(), 100);
            });
        });
    });
}

criterion_group!(benches, bench_reserve_stock, bench_list_products);
criterion_main!(benches);
