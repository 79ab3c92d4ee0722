//! Shared application state.

use std::sync::Arc;

use common::ExternalId;
use domain::{CatalogService, OrderLedger, UserDirectory};
use purchase::PurchaseCoordinator;
use query::OrderQueryService;
use store::Store;

use crate::config::Config;

/// Services shared by all handlers, all over the same store.
pub struct AppState<S: Store> {
    pub users: UserDirectory<S>,
    pub catalog: CatalogService<S>,
    pub ledger: OrderLedger<S>,
    pub coordinator: PurchaseCoordinator<S>,
    pub queries: OrderQueryService<S>,
    /// External ids granted admin when they first upsert.
    pub admin_external_ids: Vec<ExternalId>,
    /// Shared secret the front-end presents on `POST /users`, if required.
    pub frontend_token: Option<String>,
}

impl<S: Store + Clone> AppState<S> {
    pub fn new(store: S, config: &Config) -> Self {
        Self {
            users: UserDirectory::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            ledger: OrderLedger::new(store.clone())
                .with_status_policy(config.order_status_policy),
            coordinator: PurchaseCoordinator::new(store.clone())
                .with_retry_policy(config.retry_policy()),
            queries: OrderQueryService::new(store),
            admin_external_ids: config.admin_external_ids.clone(),
            frontend_token: config.frontend_token.clone(),
        }
    }

    pub fn is_bootstrap_admin(&self, external_id: ExternalId) -> bool {
        self.admin_external_ids.contains(&external_id)
    }
}

/// Creates the application state over the given store.
pub fn create_state<S: Store + Clone + 'static>(store: S, config: &Config) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, config))
}
