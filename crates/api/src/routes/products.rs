//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{ProductInput, ProductPatch};
use store::{Product, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

/// GET /products
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.list_products(actor).await?))
}

/// POST /admin/products
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    payload: Result<Json<ProductInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Json(input) = payload?;
    let product = state.catalog.create_product(actor, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /admin/products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.get_product(actor, &id).await?))
}

/// PUT /admin/products/{id}
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let Json(patch) = payload?;
    Ok(Json(state.catalog.update_product(actor, &id, patch).await?))
}

/// DELETE /admin/products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_product(actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
