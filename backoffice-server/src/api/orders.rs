//! Order REST API.
//!
//! `place_order` is the storefront entry point: the order transaction commits
//! (or rolls back) as one unit, then the loyalty accrual job is queued
//! fire-and-forget so checkout latency never depends on the points ledger.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::db::order::{self, OrderRow, OrderStatus, OrderWithItems, PlaceOrderRequest};
use crate::error::ApiError;
use crate::loyalty::AccrualJob;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct PlaceOrderResponse {
    pub success: bool,
    pub order_id: String,
    pub db_order_id: i64,
}

/// POST /api/orders
pub async fn place_order(
    State(state): State<AppState>,
    Json(req): Json<PlaceOrderRequest>,
) -> ApiResult<PlaceOrderResponse> {
    let placed = order::place_order(&state.pool, &req, "system").await?;

    // Points accrue after the commit; a failure here never unwinds the order.
    state
        .loyalty
        .enqueue(AccrualJob {
            order_id: placed.order_id.clone(),
            customer_phone: req.customer_phone.clone(),
            customer_name: Some(req.customer_name.clone()),
            customer_email: req.customer_email.clone(),
            customer_address: req.customer_address.clone(),
            total: req.total,
        })
        .await;

    Ok(Json(PlaceOrderResponse {
        success: true,
        order_id: placed.order_id,
        db_order_id: placed.db_order_id,
    }))
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub success: bool,
    pub orders: Vec<OrderWithItems>,
}

/// GET /api/orders
pub async fn list_orders(State(state): State<AppState>) -> ApiResult<OrderListResponse> {
    let orders = order::list_orders(&state.pool).await?;
    Ok(Json(OrderListResponse {
        success: true,
        orders,
    }))
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: OrderWithItems,
}

/// GET /api/orders/{order_id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<OrderResponse> {
    let order = order::get_order(&state.pool, &order_id).await?;
    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Serialize)]
pub struct UpdateStatusResponse {
    pub success: bool,
    pub order: OrderRow,
}

/// PUT /api/orders/{order_id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<UpdateStatusResponse> {
    let order = order::update_order_status(&state.pool, &order_id, req.status).await?;
    Ok(Json(UpdateStatusResponse {
        success: true,
        order,
    }))
}

#[derive(Serialize)]
pub struct RefundResponse {
    pub success: bool,
    pub order_id: String,
}

/// POST /api/orders/{order_id}/refund
pub async fn refund(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<String>,
) -> ApiResult<RefundResponse> {
    order::refund_order(&state.pool, &order_id, &auth.username).await?;
    Ok(Json(RefundResponse {
        success: true,
        order_id,
    }))
}
