//! Catalog REST API.
//!
//! Reads are public storefront traffic; writes sit behind the admin session
//! middleware and record the acting admin on every ledger entry they cause.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::db::product::{
    self, CreateProductRequest, CreateVariantRequest, ProductRow, ProductWithVariants, StockCheck,
    UpdateProductRequest, UpdateVariantRequest, VariantRow,
};
use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct ProductListResponse {
    pub success: bool,
    pub products: Vec<ProductWithVariants>,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub success: bool,
    pub product: ProductWithVariants,
}

#[derive(Serialize)]
pub struct VariantResponse {
    pub success: bool,
    pub variant: VariantRow,
}

/// GET /api/products
pub async fn list_products(State(state): State<AppState>) -> ApiResult<ProductListResponse> {
    let products = product::list_products(&state.pool).await?;
    Ok(Json(ProductListResponse {
        success: true,
        products,
    }))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ProductResponse> {
    let product = product::get_product(&state.pool, id).await?;
    Ok(Json(ProductResponse {
        success: true,
        product,
    }))
}

#[derive(Deserialize)]
pub struct CheckStockRequest {
    pub product_id: i64,
    pub variant_type: String,
    pub variant_value: String,
}

#[derive(Serialize)]
pub struct CheckStockResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stock: StockCheck,
}

/// POST /api/products/check-stock
pub async fn check_stock(
    State(state): State<AppState>,
    Json(req): Json<CheckStockRequest>,
) -> ApiResult<CheckStockResponse> {
    let stock = product::check_stock(
        &state.pool,
        req.product_id,
        &req.variant_type,
        &req.variant_value,
    )
    .await?;
    Ok(Json(CheckStockResponse {
        success: true,
        stock,
    }))
}

/// POST /admin/products
pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<ProductResponse> {
    let product = product::create_product(&state.pool, &req, &auth.username).await?;
    Ok(Json(ProductResponse {
        success: true,
        product,
    }))
}

#[derive(Serialize)]
pub struct UpdatedProductResponse {
    pub success: bool,
    pub product: ProductRow,
}

/// PUT /admin/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProductRequest>,
) -> ApiResult<UpdatedProductResponse> {
    let product = product::update_product(&state.pool, id, &req).await?;
    Ok(Json(UpdatedProductResponse {
        success: true,
        product,
    }))
}

/// DELETE /admin/products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    product::delete_product(&state.pool, id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /admin/products/{id}/variants
pub async fn create_variant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<CreateVariantRequest>,
) -> ApiResult<VariantResponse> {
    let variant = product::create_variant(&state.pool, id, &req, &auth.username).await?;
    Ok(Json(VariantResponse {
        success: true,
        variant,
    }))
}

/// PUT /admin/variants/{id}
pub async fn update_variant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateVariantRequest>,
) -> ApiResult<VariantResponse> {
    let variant = product::update_variant(&state.pool, id, &req, &auth.username).await?;
    Ok(Json(VariantResponse {
        success: true,
        variant,
    }))
}

/// DELETE /admin/variants/{id}
pub async fn delete_variant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    product::delete_variant(&state.pool, id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
