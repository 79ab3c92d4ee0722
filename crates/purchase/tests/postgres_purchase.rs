//! Purchase scenarios against PostgreSQL, where concurrent transactions
//! really interleave.
//!
//! Tests share one container and never truncate; every test seeds its own
//! users and category, so they can run in parallel:
//!
//! ```bash
//! cargo test -p purchase --test postgres_purchase
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use common::{CategoryId, ExternalId, Money, OrderId, ProductId, UserId};
use domain::{CatalogService, DomainError, NewProduct, UserDirectory};
use purchase::{PurchaseCoordinator, PurchaseRequest};
use query::OrderQueryService;
use store::{PostgresStore, PostgresStoreOptions, Product, ProductChanges, Store, UserProfile};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

static NEXT_EXTERNAL_ID: AtomicI64 = AtomicI64::new(1_000);

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let options = PostgresStoreOptions::default();
            let store = PostgresStore::connect(&connection_string, &options)
                .await
                .unwrap();
            store.run_migrations().await.unwrap();
            store.pool().close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

struct Shop {
    store: PostgresStore,
    catalog: CatalogService<PostgresStore>,
    users: UserDirectory<PostgresStore>,
    coordinator: PurchaseCoordinator<PostgresStore>,
    queries: OrderQueryService<PostgresStore>,
}

async fn shop() -> Shop {
    let info = get_container_info().await;
    let store = PostgresStore::connect(&info.connection_string, &PostgresStoreOptions::default())
        .await
        .unwrap();

    Shop {
        catalog: CatalogService::new(store.clone()),
        users: UserDirectory::new(store.clone()),
        coordinator: PurchaseCoordinator::new(store.clone()),
        queries: OrderQueryService::new(store.clone()),
        store,
    }
}

async fn seed_buyer(shop: &Shop) -> UserId {
    let external_id = NEXT_EXTERNAL_ID.fetch_add(1, Ordering::SeqCst);
    shop.users
        .upsert(UserProfile::new(ExternalId::new(external_id), None, None))
        .await
        .unwrap()
        .id
}

async fn seed_product(shop: &Shop, price: Money, quantity: u32) -> Product {
    let category = shop
        .catalog
        .create_category(&format!("Electronics {}", CategoryId::new()))
        .await
        .unwrap();
    shop.catalog
        .create_product(NewProduct {
            name: "Laptop".to_string(),
            description: None,
            price,
            quantity,
            category_id: category.id,
        })
        .await
        .unwrap()
}

async fn stock(shop: &Shop, product_id: ProductId) -> u32 {
    shop.catalog.get_product(product_id).await.unwrap().quantity
}

async fn order_count(shop: &Shop, buyers: &[UserId]) -> usize {
    let mut count = 0;
    for buyer in buyers {
        count += shop.store.list_orders_by_user(*buyer).await.unwrap().len();
    }
    count
}

async fn order_exists(shop: &Shop, order_id: OrderId) -> bool {
    shop.store.get_order(order_id).await.unwrap().is_some()
}

#[tokio::test]
async fn insufficient_stock_leaves_no_order_row() {
    let shop = shop().await;
    let buyer = seed_buyer(&shop).await;
    let product = seed_product(&shop, Money::from_units(100), 1).await;

    let result = shop
        .coordinator
        .purchase(PurchaseRequest::new(buyer, product.id, 5))
        .await;

    assert!(matches!(
        result,
        Err(DomainError::InsufficientStock {
            requested: 5,
            available: 1,
            ..
        })
    ));
    assert_eq!(order_count(&shop, &[buyer]).await, 0);
    assert_eq!(stock(&shop, product.id).await, 1);
}

#[tokio::test]
async fn unknown_product_leaves_no_order_row() {
    let shop = shop().await;
    let buyer = seed_buyer(&shop).await;

    let result = shop
        .coordinator
        .purchase(PurchaseRequest::new(buyer, ProductId::new(), 1))
        .await;

    assert!(matches!(
        result,
        Err(DomainError::NotFound {
            entity: "Product",
            ..
        })
    ));
    assert_eq!(order_count(&shop, &[buyer]).await, 0);
}

#[tokio::test]
async fn committed_purchase_is_visible_with_frozen_price() {
    let shop = shop().await;
    let buyer = seed_buyer(&shop).await;
    let product = seed_product(&shop, Money::from_units(100), 5).await;

    let receipt = shop
        .coordinator
        .purchase(PurchaseRequest::new(buyer, product.id, 2))
        .await
        .unwrap();
    assert!(order_exists(&shop, receipt.order.id).await);
    assert_eq!(receipt.product.quantity, 3);

    shop.catalog
        .update_product(
            product.id,
            ProductChanges {
                price: Some(Money::from_units(150)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let details = shop
        .queries
        .get_order_details(receipt.order.id)
        .await
        .unwrap();
    assert_eq!(details.total, Money::from_units(200));
    assert_eq!(stock(&shop, product.id).await, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_buyers_racing_for_the_last_units() {
    let shop = Arc::new(shop().await);
    let first = seed_buyer(&shop).await;
    let second = seed_buyer(&shop).await;
    let product = seed_product(&shop, Money::from_units(100), 5).await;

    let handles: Vec<_> = [first, second]
        .into_iter()
        .map(|buyer| {
            let shop = Arc::clone(&shop);
            tokio::spawn(async move {
                shop.coordinator
                    .purchase(PurchaseRequest::new(buyer, product.id, 3))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(DomainError::InsufficientStock { available: 2, .. }) => insufficient += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(insufficient, 1);
    assert_eq!(stock(&shop, product.id).await, 2);
    assert_eq!(order_count(&shop, &[first, second]).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_buyers_never_oversell() {
    let shop = Arc::new(shop().await);
    let product = seed_product(&shop, Money::from_units(10), 10).await;
    let mut buyers = Vec::new();
    for _ in 0..25 {
        buyers.push(seed_buyer(&shop).await);
    }

    let handles: Vec<_> = buyers
        .iter()
        .map(|&buyer| {
            let shop = Arc::clone(&shop);
            tokio::spawn(async move {
                shop.coordinator
                    .purchase(PurchaseRequest::new(buyer, product.id, 1))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(DomainError::InsufficientStock { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(stock(&shop, product.id).await, 0);
    assert_eq!(order_count(&shop, &buyers).await, 10);
}
