//! Coordinator for the all-or-nothing purchase transaction.

use std::time::Instant;

use common::{ProductId, UserId};
use domain::{CatalogService, DomainError, OrderLedger, Result, validate};
use store::{Order, OrderItem, Product, Store, StoreTransaction};

use crate::retry::RetryPolicy;

/// A request to buy `quantity` units of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl PurchaseRequest {
    pub fn new(user_id: UserId, product_id: ProductId, quantity: u32) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
        }
    }
}

/// Everything a committed purchase wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub order: Order,
    pub item: OrderItem,
    /// The product as reserved, with the on-hand count after the decrement.
    pub product: Product,
}

/// Orchestrates order creation, stock reservation and the line item append
/// as a single transaction.
pub struct PurchaseCoordinator<S: Store> {
    store: S,
    catalog: CatalogService<S>,
    ledger: OrderLedger<S>,
    retry: RetryPolicy,
}

impl<S> PurchaseCoordinator<S>
where
    S: Store + Clone,
{
    /// Creates a new coordinator with the default retry policy.
    pub fn new(store: S) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            ledger: OrderLedger::new(store.clone()),
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs one purchase attempt.
    ///
    /// The buyer must already exist. On any failure nothing is persisted:
    /// no order, no line item, no stock decrement.
    #[tracing::instrument(
        skip(self, request),
        fields(
            user_id = %request.user_id,
            product_id = %request.product_id,
            quantity = request.quantity
        )
    )]
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseReceipt> {
        let start = Instant::now();

        let result = self.execute(request).await;

        let outcome = match &result {
            Ok(_) => "committed",
            Err(DomainError::InsufficientStock { .. }) => "insufficient_stock",
            Err(DomainError::NotFound { .. }) => "not_found",
            Err(DomainError::Validation(_)) => "invalid",
            Err(DomainError::ConflictOrTransient(_)) => "transient",
            Err(DomainError::Store(_)) => "error",
        };
        metrics::counter!("purchases_total", "outcome" => outcome).increment(1);
        metrics::histogram!("purchase_duration_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok(receipt) => tracing::info!(
                order_id = %receipt.order.id,
                unit_price = %receipt.item.unit_price,
                remaining = receipt.product.quantity,
                "purchase committed"
            ),
            Err(e) => tracing::warn!(error = %e, outcome, "purchase rolled back"),
        }

        result
    }

    /// Runs a purchase, retrying from scratch on contention or timeouts.
    ///
    /// Every other failure is returned after the first attempt.
    pub async fn purchase_with_retry(&self, request: PurchaseRequest) -> Result<PurchaseReceipt> {
        let mut attempt = 1;
        loop {
            match self.purchase(request).await {
                Err(e) if e.is_retryable() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    metrics::counter!("purchase_retries_total").increment(1);
                    tracing::warn!(
                        attempt,
                        error = %e,
                        ?delay,
                        "retrying purchase"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn execute(&self, request: PurchaseRequest) -> Result<PurchaseReceipt> {
        let quantity = validate::line_quantity(request.quantity)?;

        if self.store.get_user(request.user_id).await?.is_none() {
            return Err(DomainError::NotFound {
                entity: "User",
                id: request.user_id.to_string(),
            });
        }

        let mut tx = self.store.begin().await?;
        match self
            .write_purchase(tx.as_mut(), request.user_id, request.product_id, quantity)
            .await
        {
            Ok(receipt) => {
                tx.commit().await?;
                Ok(receipt)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn write_purchase(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<PurchaseReceipt> {
        let order = self.ledger.create_order_in(&mut *tx, user_id).await?;

        let product = self
            .catalog
            .reserve_stock_in(&mut *tx, product_id, quantity)
            .await?;

        let item = self
            .ledger
            .append_item_in(&mut *tx, order.id, product.id, quantity, product.price)
            .await?;

        Ok(PurchaseReceipt {
            order,
            item,
            product,
        })
    }
}
