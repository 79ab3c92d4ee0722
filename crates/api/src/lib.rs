//! HTTP boundary for the storefront engine.
//!
//! Stands in for the messaging front-end's command handlers: user upsert,
//! catalog browsing and admin mutations, purchases and order history,
//! with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::{AppState, create_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/users", post(routes::users::upsert::<S>))
        .route(
            "/categories",
            get(routes::catalog::list_categories::<S>).post(routes::catalog::create_category::<S>),
        )
        .route(
            "/categories/{id}",
            delete(routes::catalog::delete_category::<S>),
        )
        .route(
            "/products",
            get(routes::catalog::list_products::<S>).post(routes::catalog::create_product::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::catalog::get_product::<S>)
                .patch(routes::catalog::update_product::<S>)
                .delete(routes::catalog::delete_product::<S>),
        )
        .route("/purchases", post(routes::purchases::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", post(routes::orders::set_status::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Registers descriptions for the metrics the services record.
pub fn describe_metrics() {
    metrics::describe_counter!("purchases_total", "Purchase attempts by outcome");
    metrics::describe_histogram!(
        "purchase_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent in one purchase attempt"
    );
    metrics::describe_counter!(
        "purchase_retries_total",
        "Purchases retried after a transient failure"
    );
    metrics::describe_counter!(
        "stock_reservations_total",
        "Stock reservations by outcome"
    );
}
