//! Order placement, listing and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{PlaceOrderRequest, PlacedOrder, UpdateStatusRequest};
use store::Store;

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

/// POST /orders: place an order for the caller.
#[tracing::instrument(skip(state, payload))]
pub async fn place<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlacedOrder>), ApiError> {
    let Json(request) = payload?;
    let placed = state.orders.place_order(actor, request).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

/// GET /orders: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
) -> Result<Json<Vec<PlacedOrder>>, ApiError> {
    Ok(Json(state.orders.list_orders(actor).await?))
}

/// PATCH /orders/{id}: owner cancellation of a pending order.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<PlacedOrder>, ApiError> {
    Ok(Json(state.orders.cancel_order(actor, &id).await?))
}

/// PATCH /admin/orders/{id}: move an order to any status.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<PlacedOrder>, ApiError> {
    let Json(request) = payload?;
    let updated = state
        .orders
        .update_order_status(actor, &id, &request.status)
        .await?;
    Ok(Json(updated))
}
