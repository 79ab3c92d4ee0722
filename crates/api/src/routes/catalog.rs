//! Category and product endpoints. Mutations require an admin caller.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{CategoryId, Money, ProductId};
use domain::NewProduct;
use serde::{Deserialize, Serialize};
use store::{Category, Product, ProductChanges, Store};

use super::parse_id;
use crate::auth::AdminCaller;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct ListProductsQuery {
    pub category_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub quantity: u32,
    pub category_id: String,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub quantity: Option<u32>,
    pub category_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id.to_string(),
            name: category.name,
        }
    }
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub price: String,
    pub quantity: u32,
    pub category_id: String,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            description: product.description,
            price_cents: product.price.cents(),
            price: product.price.to_string(),
            quantity: product.quantity,
            category_id: product.category_id.to_string(),
        }
    }
}

// -- Handlers --

/// GET /categories — list categories by name.
pub async fn list_categories<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = state.catalog.list_categories().await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

/// POST /categories — create a category.
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.id))]
pub async fn create_category<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminCaller,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let category = state.catalog.create_category(&req.name).await?;
    Ok((StatusCode::CREATED, Json(category.into())))
}

/// DELETE /categories/{id} — delete a category and its products.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn delete_category<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let category_id: CategoryId = parse_id(&id, "category")?;
    state.catalog.delete_category(category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /products?category_id= — list products by name.
pub async fn list_products<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let category_id = query
        .category_id
        .as_deref()
        .map(|id| parse_id::<CategoryId>(id, "category"))
        .transpose()?;

    let products = state.catalog.list_products(category_id).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /products/{id} — load one product.
pub async fn get_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    let product = state.catalog.get_product(product_id).await?;
    Ok(Json(product.into()))
}

/// POST /products — create a product.
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.id))]
pub async fn create_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminCaller,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state
        .catalog
        .create_product(NewProduct {
            name: req.name,
            description: req.description,
            price: Money::from_cents(req.price_cents),
            quantity: req.quantity,
            category_id: parse_id(&req.category_id, "category")?,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PATCH /products/{id} — partial update; omitted fields are unchanged.
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.id))]
pub async fn update_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminCaller,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    let changes = ProductChanges {
        name: req.name,
        description: req.description,
        price: req.price_cents.map(Money::from_cents),
        quantity: req.quantity,
        category_id: req
            .category_id
            .as_deref()
            .map(|id| parse_id::<CategoryId>(id, "category"))
            .transpose()?,
    };

    let product = state.catalog.update_product(product_id, changes).await?;
    Ok(Json(product.into()))
}

/// DELETE /products/{id} — delete a product not yet on any order.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn delete_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    state.catalog.delete_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
