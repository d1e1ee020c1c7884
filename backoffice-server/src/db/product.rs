//! Catalog: products and their variants.
//!
//! Stock is owned by the inventory ledger. Variant creation and edits never
//! write `stock_quantity` directly: initial stock and admin corrections are
//! applied through [`inventory::adjust_stock`] so the ledger stays complete.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::error::{ApiError, ApiResult};

use super::inventory::{self, TransactionKind};
use super::is_unique_violation;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub base_price: f64,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VariantRow {
    pub id: i64,
    pub product_id: i64,
    pub variant_type: String,
    pub variant_value: String,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub sku: Option<String>,
    pub is_available: bool,
    pub price_modifier: f64,
    pub variant_price: Option<f64>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Variant with the derived availability flags the storefront needs.
#[derive(Debug, Clone, Serialize)]
pub struct VariantView {
    #[serde(flatten)]
    pub variant: VariantRow,
    pub in_stock: bool,
    pub low_stock: bool,
}

impl From<VariantRow> for VariantView {
    fn from(variant: VariantRow) -> Self {
        let in_stock = variant.is_available && variant.stock_quantity > 0;
        let low_stock =
            variant.stock_quantity > 0 && variant.stock_quantity <= variant.low_stock_threshold;
        Self {
            variant,
            in_stock,
            low_stock,
        }
    }
}

/// Product with its variants grouped by dimension ("Size" -> [S, M, L]).
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: ProductRow,
    pub variants: BTreeMap<String, Vec<VariantView>>,
}

pub fn group_variants(variants: Vec<VariantRow>) -> BTreeMap<String, Vec<VariantView>> {
    let mut grouped: BTreeMap<String, Vec<VariantView>> = BTreeMap::new();
    for variant in variants {
        grouped
            .entry(variant.variant_type.clone())
            .or_default()
            .push(variant.into());
    }
    grouped
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    pub base_price: f64,
    pub image_url: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub variants: Vec<CreateVariantRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVariantRequest {
    pub variant_type: String,
    pub variant_value: String,
    #[serde(default)]
    pub stock_quantity: i32,
    pub low_stock_threshold: Option<i32>,
    pub sku: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub price_modifier: f64,
    pub variant_price: Option<f64>,
    pub image_url: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub base_price: Option<f64>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateVariantRequest {
    pub variant_value: Option<String>,
    pub stock_quantity: Option<i32>,
    pub low_stock_threshold: Option<i32>,
    pub sku: Option<String>,
    pub is_available: Option<bool>,
    pub price_modifier: Option<f64>,
    pub variant_price: Option<f64>,
    pub image_url: Option<String>,
}

const PRODUCT_COLUMNS: &str =
    "id, name, category, base_price, image_url, description, is_active, created_at, updated_at";

const VARIANT_COLUMNS: &str = r#"
    id, product_id, variant_type, variant_value, stock_quantity,
    low_stock_threshold, sku, is_available, price_modifier, variant_price,
    image_url, created_at, updated_at
"#;

pub async fn list_products(pool: &PgPool) -> ApiResult<Vec<ProductWithVariants>> {
    let products: Vec<ProductRow> = sqlx::query_as(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active ORDER BY category, name"
    ))
    .fetch_all(pool)
    .await?;

    if products.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
    let variants: Vec<VariantRow> = sqlx::query_as(&format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = ANY($1) ORDER BY variant_type, variant_value"
    ))
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_product: std::collections::HashMap<i64, Vec<VariantRow>> =
        std::collections::HashMap::new();
    for variant in variants {
        by_product.entry(variant.product_id).or_default().push(variant);
    }

    Ok(products
        .into_iter()
        .map(|product| ProductWithVariants {
            variants: group_variants(by_product.remove(&product.id).unwrap_or_default()),
            product,
        })
        .collect())
}

pub async fn get_product(pool: &PgPool, product_id: i64) -> ApiResult<ProductWithVariants> {
    let product: Option<ProductRow> = sqlx::query_as(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    let Some(product) = product else {
        return Err(ApiError::ProductNotFound(product_id));
    };

    let variants: Vec<VariantRow> = sqlx::query_as(&format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = $1 ORDER BY variant_type, variant_value"
    ))
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(ProductWithVariants {
        variants: group_variants(variants),
        product,
    })
}

/// Create a product, optionally with its initial variants. Initial stock on
/// each variant is recorded as a `restock` ledger entry, same as
/// [`create_variant`].
pub async fn create_product(
    pool: &PgPool,
    req: &CreateProductRequest,
    actor: &str,
) -> ApiResult<ProductWithVariants> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("product name is required".into()));
    }
    if req.base_price < 0.0 {
        return Err(ApiError::Validation("base price cannot be negative".into()));
    }

    let mut tx = pool.begin().await?;

    let product: ProductRow = sqlx::query_as(&format!(
        r#"
        INSERT INTO products (name, category, base_price, image_url, description, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {PRODUCT_COLUMNS}
        "#
    ))
    .bind(&req.name)
    .bind(&req.category)
    .bind(req.base_price)
    .bind(&req.image_url)
    .bind(&req.description)
    .bind(req.is_active)
    .fetch_one(&mut *tx)
    .await?;

    let mut variants = Vec::with_capacity(req.variants.len());
    for variant in &req.variants {
        variants.push(insert_variant(&mut tx, product.id, variant, actor).await?);
    }

    tx.commit().await?;

    Ok(ProductWithVariants {
        variants: group_variants(variants),
        product,
    })
}

pub async fn update_product(
    pool: &PgPool,
    product_id: i64,
    req: &UpdateProductRequest,
) -> ApiResult<ProductRow> {
    let product: Option<ProductRow> = sqlx::query_as(&format!(
        r#"
        UPDATE products SET
            name = COALESCE($1, name),
            category = COALESCE($2, category),
            base_price = COALESCE($3, base_price),
            image_url = COALESCE($4, image_url),
            description = COALESCE($5, description),
            is_active = COALESCE($6, is_active),
            updated_at = NOW()
        WHERE id = $7
        RETURNING {PRODUCT_COLUMNS}
        "#
    ))
    .bind(&req.name)
    .bind(&req.category)
    .bind(req.base_price)
    .bind(&req.image_url)
    .bind(&req.description)
    .bind(req.is_active)
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    product.ok_or(ApiError::ProductNotFound(product_id))
}

/// Delete a product and, via cascade, its variants and their ledger rows.
pub async fn delete_product(pool: &PgPool, product_id: i64) -> ApiResult<()> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(product_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::ProductNotFound(product_id));
    }
    Ok(())
}

/// Insert a variant with zero stock, then ledger the initial quantity as a
/// `restock` entry so replay still starts from zero.
async fn insert_variant(
    conn: &mut PgConnection,
    product_id: i64,
    req: &CreateVariantRequest,
    actor: &str,
) -> ApiResult<VariantRow> {
    if req.stock_quantity < 0 {
        return Err(ApiError::Validation(
            "initial stock cannot be negative".into(),
        ));
    }

    let inserted: Result<(i64,), sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO product_variants (
            product_id, variant_type, variant_value, stock_quantity,
            low_stock_threshold, sku, is_available, price_modifier,
            variant_price, image_url
        ) VALUES ($1, $2, $3, 0, COALESCE($4, 5), $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(product_id)
    .bind(&req.variant_type)
    .bind(&req.variant_value)
    .bind(req.low_stock_threshold)
    .bind(&req.sku)
    .bind(req.is_available)
    .bind(req.price_modifier)
    .bind(req.variant_price)
    .bind(&req.image_url)
    .fetch_one(&mut *conn)
    .await;

    let (variant_id,) = inserted.map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict(format!(
                "Variant {} = {}",
                req.variant_type, req.variant_value
            ))
        } else {
            e.into()
        }
    })?;

    if req.stock_quantity > 0 {
        inventory::adjust_stock(
            &mut *conn,
            variant_id,
            req.stock_quantity,
            TransactionKind::Restock,
            None,
            Some("Initial stock"),
            actor,
        )
        .await?;
    }

    fetch_variant(&mut *conn, variant_id).await
}

pub async fn create_variant(
    pool: &PgPool,
    product_id: i64,
    req: &CreateVariantRequest,
    actor: &str,
) -> ApiResult<VariantRow> {
    let mut tx = pool.begin().await?;

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(ApiError::ProductNotFound(product_id));
    }

    let variant = insert_variant(&mut tx, product_id, req, actor).await?;
    tx.commit().await?;
    Ok(variant)
}

/// Edit a variant. A changed `stock_quantity` is applied as an `adjustment`
/// ledger entry for the delta, never as a direct write.
pub async fn update_variant(
    pool: &PgPool,
    variant_id: i64,
    req: &UpdateVariantRequest,
    actor: &str,
) -> ApiResult<VariantRow> {
    if let Some(stock) = req.stock_quantity {
        if stock < 0 {
            return Err(ApiError::Validation("stock cannot be negative".into()));
        }
    }

    let mut tx = pool.begin().await?;

    let current: Option<(i32,)> =
        sqlx::query_as("SELECT stock_quantity FROM product_variants WHERE id = $1 FOR UPDATE")
            .bind(variant_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some((current_stock,)) = current else {
        return Err(ApiError::NotFound(format!("Variant {variant_id}")));
    };

    sqlx::query(
        r#"
        UPDATE product_variants SET
            variant_value = COALESCE($1, variant_value),
            low_stock_threshold = COALESCE($2, low_stock_threshold),
            sku = COALESCE($3, sku),
            is_available = COALESCE($4, is_available),
            price_modifier = COALESCE($5, price_modifier),
            variant_price = COALESCE($6, variant_price),
            image_url = COALESCE($7, image_url),
            updated_at = NOW()
        WHERE id = $8
        "#,
    )
    .bind(&req.variant_value)
    .bind(req.low_stock_threshold)
    .bind(&req.sku)
    .bind(req.is_available)
    .bind(req.price_modifier)
    .bind(req.variant_price)
    .bind(&req.image_url)
    .bind(variant_id)
    .execute(&mut *tx)
    .await?;

    if let Some(target) = req.stock_quantity {
        let delta = target - current_stock;
        if delta != 0 {
            inventory::adjust_stock(
                &mut tx,
                variant_id,
                delta,
                TransactionKind::Adjustment,
                None,
                Some("Admin edit"),
                actor,
            )
            .await?;
        }
    }

    let variant = fetch_variant(&mut tx, variant_id).await?;
    tx.commit().await?;
    Ok(variant)
}

pub async fn delete_variant(pool: &PgPool, variant_id: i64) -> ApiResult<()> {
    let result = sqlx::query("DELETE FROM product_variants WHERE id = $1")
        .bind(variant_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Variant {variant_id}")));
    }
    Ok(())
}

async fn fetch_variant(conn: &mut PgConnection, variant_id: i64) -> ApiResult<VariantRow> {
    let variant: VariantRow = sqlx::query_as(&format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1"
    ))
    .bind(variant_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(variant)
}

/// Storefront stock probe for one variant, matched case-insensitively.
#[derive(Debug, Clone, Serialize)]
pub struct StockCheck {
    pub variant_id: i64,
    pub stock_quantity: i32,
    pub is_available: bool,
    pub in_stock: bool,
    pub low_stock: bool,
}

pub async fn check_stock(
    pool: &PgPool,
    product_id: i64,
    variant_type: &str,
    variant_value: &str,
) -> ApiResult<StockCheck> {
    let row: Option<(i64, i32, i32, bool)> = sqlx::query_as(
        r#"
        SELECT id, stock_quantity, low_stock_threshold, is_available
        FROM product_variants
        WHERE product_id = $1
          AND LOWER(variant_type) = LOWER($2)
          AND LOWER(variant_value) = LOWER($3)
        "#,
    )
    .bind(product_id)
    .bind(variant_type)
    .bind(variant_value)
    .fetch_optional(pool)
    .await?;

    let Some((variant_id, stock_quantity, threshold, is_available)) = row else {
        return Err(ApiError::VariantNotFound {
            product_id,
            variant_type: variant_type.to_string(),
            variant_value: variant_value.to_string(),
        });
    };

    Ok(StockCheck {
        variant_id,
        stock_quantity,
        is_available,
        in_stock: is_available && stock_quantity > 0,
        low_stock: stock_quantity > 0 && stock_quantity <= threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(variant_type: &str, value: &str, stock: i32, threshold: i32) -> VariantRow {
        VariantRow {
            id: 1,
            product_id: 1,
            variant_type: variant_type.to_string(),
            variant_value: value.to_string(),
            stock_quantity: stock,
            low_stock_threshold: threshold,
            sku: None,
            is_available: true,
            price_modifier: 0.0,
            variant_price: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_low_stock_flag_boundary() {
        // Flag is set at stock <= threshold but only while stock remains.
        assert!(!VariantView::from(variant("Size", "M", 6, 5)).low_stock);
        assert!(VariantView::from(variant("Size", "M", 5, 5)).low_stock);
        assert!(VariantView::from(variant("Size", "M", 1, 5)).low_stock);
        assert!(!VariantView::from(variant("Size", "M", 0, 5)).low_stock);
    }

    #[test]
    fn test_in_stock_requires_availability() {
        let mut v = variant("Size", "M", 3, 5);
        assert!(VariantView::from(v.clone()).in_stock);
        v.is_available = false;
        assert!(!VariantView::from(v).in_stock);
    }

    #[test]
    fn test_group_variants_by_dimension() {
        let grouped = group_variants(vec![
            variant("Size", "S", 1, 5),
            variant("Size", "M", 2, 5),
            variant("Colour", "Black", 3, 5),
        ]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["Size"].len(), 2);
        assert_eq!(grouped["Colour"].len(), 1);
    }
}
