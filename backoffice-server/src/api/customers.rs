//! Customer REST API: storefront lookup plus admin points management.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::db::customer::{self, CustomerRow, PointsKind};
use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Deserialize)]
pub struct LookupRequest {
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    pub success: bool,
    pub customer: CustomerRow,
}

/// POST /api/customers/lookup
pub async fn lookup(
    State(state): State<AppState>,
    Json(req): Json<LookupRequest>,
) -> ApiResult<CustomerResponse> {
    let customer = customer::lookup_or_create(
        &state.pool,
        &req.phone,
        req.name.as_deref(),
        req.email.as_deref(),
        req.address.as_deref(),
    )
    .await?;
    Ok(Json(CustomerResponse {
        success: true,
        customer,
    }))
}

#[derive(Serialize)]
pub struct CustomerListResponse {
    pub success: bool,
    pub customers: Vec<CustomerRow>,
}

/// GET /admin/customers
pub async fn list(State(state): State<AppState>) -> ApiResult<CustomerListResponse> {
    let customers = customer::list_customers(&state.pool).await?;
    Ok(Json(CustomerListResponse {
        success: true,
        customers,
    }))
}

#[derive(Deserialize)]
pub struct AdjustPointsRequest {
    pub points: i32,
    pub notes: Option<String>,
}

/// POST /admin/customers/{id}/adjust-points
pub async fn adjust_points(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<AdjustPointsRequest>,
) -> ApiResult<CustomerResponse> {
    let customer = customer::adjust_points(
        &state.pool,
        id,
        req.points,
        req.notes.as_deref(),
        &auth.username,
    )
    .await?;
    Ok(Json(CustomerResponse {
        success: true,
        customer,
    }))
}

#[derive(Deserialize)]
pub struct AwardPointsRequest {
    pub points: i32,
    pub order_id: Option<String>,
    pub order_total: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct AwardPointsResponse {
    pub success: bool,
    pub points_earned: i32,
    pub new_balance: i32,
}

/// POST /api/customers/{id}/award-points
///
/// Manual accrual path. An `order_total` also bumps the customer's lifetime
/// spend and order count, as the automatic post-order accrual does.
pub async fn award_points(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<AwardPointsRequest>,
) -> ApiResult<AwardPointsResponse> {
    if req.points <= 0 {
        return Err(ApiError::Validation(
            "awarded points must be positive".into(),
        ));
    }

    if let Some(total) = req.order_total {
        customer::record_order_stats(&state.pool, id, total).await?;
    }

    let customer = customer::apply_points(
        &state.pool,
        id,
        req.points,
        PointsKind::Earned,
        req.order_id.as_deref(),
        req.order_total,
        Some(req.notes.as_deref().unwrap_or("1% cashback on order")),
        &auth.username,
    )
    .await?;

    Ok(Json(AwardPointsResponse {
        success: true,
        points_earned: req.points,
        new_balance: customer.total_points,
    }))
}

#[derive(Deserialize)]
pub struct RedeemPointsRequest {
    pub points: i32,
    pub notes: Option<String>,
}

/// POST /api/customers/{id}/redeem-points
pub async fn redeem_points(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<RedeemPointsRequest>,
) -> ApiResult<CustomerResponse> {
    let customer = customer::redeem_points(
        &state.pool,
        id,
        req.points,
        req.notes.as_deref(),
        &auth.username,
    )
    .await?;
    Ok(Json(CustomerResponse {
        success: true,
        customer,
    }))
}
