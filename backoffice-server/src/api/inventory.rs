//! Inventory REST API: stock reports, ledger listing and manual restock.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::db::inventory::{self, InventoryTransactionRow, StockAdjustment, StockLevelRow};
use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct StockLevelResponse {
    pub success: bool,
    pub variants: Vec<StockLevelRow>,
}

/// GET /api/inventory/low-stock
pub async fn low_stock(State(state): State<AppState>) -> ApiResult<StockLevelResponse> {
    let variants = inventory::list_low_stock(&state.pool).await?;
    Ok(Json(StockLevelResponse {
        success: true,
        variants,
    }))
}

/// GET /api/inventory/out-of-stock
pub async fn out_of_stock(State(state): State<AppState>) -> ApiResult<StockLevelResponse> {
    let variants = inventory::list_out_of_stock(&state.pool).await?;
    Ok(Json(StockLevelResponse {
        success: true,
        variants,
    }))
}

#[derive(Serialize)]
pub struct TransactionListResponse {
    pub success: bool,
    pub transactions: Vec<InventoryTransactionRow>,
}

/// GET /api/inventory/transactions/{variant_id}
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(variant_id): Path<i64>,
) -> ApiResult<TransactionListResponse> {
    let transactions = inventory::list_transactions(&state.pool, variant_id).await?;
    Ok(Json(TransactionListResponse {
        success: true,
        transactions,
    }))
}

#[derive(Deserialize)]
pub struct RestockRequest {
    pub variant_id: i64,
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct RestockResponse {
    pub success: bool,
    #[serde(flatten)]
    pub adjustment: StockAdjustment,
}

/// POST /api/inventory/restock
pub async fn restock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<RestockRequest>,
) -> ApiResult<RestockResponse> {
    let adjustment = inventory::restock(
        &state.pool,
        req.variant_id,
        req.quantity,
        req.notes.as_deref(),
        &auth.username,
    )
    .await?;
    Ok(Json(RestockResponse {
        success: true,
        adjustment,
    }))
}
