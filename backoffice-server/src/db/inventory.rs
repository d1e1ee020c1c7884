//! Inventory ledger.
//!
//! Owns the per-variant stock quantity and the append-only transaction log
//! explaining every change. Stock is never overwritten directly: all mutations
//! go through [`adjust_stock`], which locks the variant row, validates the
//! delta, writes the new quantity and appends exactly one log row — all on the
//! caller's connection, so the caller decides the transaction boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::error::{ApiError, ApiResult};

/// Ledger operation kinds. Sales decrement, restocks and refunds increment,
/// adjustments go either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Sale,
    Restock,
    Refund,
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Restock => "restock",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
        }
    }
}

/// One append-only ledger entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InventoryTransactionRow {
    pub id: i64,
    pub variant_id: i64,
    pub transaction_type: String,
    pub quantity_change: i32,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub reference_order_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful stock adjustment.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StockAdjustment {
    pub previous_quantity: i32,
    pub new_quantity: i32,
}

/// Fold a variant's ledger entries in creation order starting from zero.
/// For an intact ledger this reproduces the variant's current stock quantity.
pub fn replay(entries: &[InventoryTransactionRow]) -> i32 {
    entries.iter().fold(0, |acc, e| acc + e.quantity_change)
}

/// Apply a signed stock delta to a variant and append the matching ledger row.
///
/// Runs entirely on `conn`: callers compose it into their own transaction
/// (order placement runs several of these plus the order rows in one unit).
/// The variant row is read `FOR UPDATE`, so no concurrent adjustment can
/// interleave between the read and the write.
pub async fn adjust_stock(
    conn: &mut PgConnection,
    variant_id: i64,
    delta: i32,
    kind: TransactionKind,
    reference_order_id: Option<&str>,
    notes: Option<&str>,
    actor: &str,
) -> ApiResult<StockAdjustment> {
    let row: Option<(i32, String)> = sqlx::query_as(
        r#"
        SELECT pv.stock_quantity, p.name
        FROM product_variants pv
        JOIN products p ON p.id = pv.product_id
        WHERE pv.id = $1
        FOR UPDATE OF pv
        "#,
    )
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((previous_quantity, product_name)) = row else {
        return Err(ApiError::NotFound(format!("Variant {variant_id}")));
    };

    let Some(new_quantity) = previous_quantity.checked_add(delta) else {
        return Err(ApiError::InvalidAdjustment(format!(
            "stock adjustment overflows (current: {previous_quantity}, delta: {delta})"
        )));
    };
    if new_quantity < 0 {
        if kind == TransactionKind::Sale {
            return Err(ApiError::InsufficientStock {
                product_name,
                available: previous_quantity,
                requested: -delta,
            });
        }
        return Err(ApiError::InvalidAdjustment(format!(
            "stock for variant {variant_id} cannot go below zero (current: {previous_quantity}, delta: {delta})"
        )));
    }

    sqlx::query("UPDATE product_variants SET stock_quantity = $1, updated_at = NOW() WHERE id = $2")
        .bind(new_quantity)
        .bind(variant_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO inventory_transactions (
            variant_id, transaction_type, quantity_change,
            previous_quantity, new_quantity, reference_order_id,
            notes, created_by
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(variant_id)
    .bind(kind.as_str())
    .bind(delta)
    .bind(previous_quantity)
    .bind(new_quantity)
    .bind(reference_order_id)
    .bind(notes)
    .bind(actor)
    .execute(&mut *conn)
    .await?;

    Ok(StockAdjustment {
        previous_quantity,
        new_quantity,
    })
}

/// Manual restock: its own transaction boundary.
pub async fn restock(
    pool: &PgPool,
    variant_id: i64,
    quantity: i32,
    notes: Option<&str>,
    actor: &str,
) -> ApiResult<StockAdjustment> {
    if quantity <= 0 {
        return Err(ApiError::Validation(
            "restock quantity must be positive".into(),
        ));
    }

    let mut tx = pool.begin().await?;
    let adjustment = adjust_stock(
        &mut tx,
        variant_id,
        quantity,
        TransactionKind::Restock,
        None,
        notes,
        actor,
    )
    .await?;
    tx.commit().await?;

    Ok(adjustment)
}

/// Ledger listing for one variant, in creation order.
pub async fn list_transactions(
    pool: &PgPool,
    variant_id: i64,
) -> ApiResult<Vec<InventoryTransactionRow>> {
    let rows: Vec<InventoryTransactionRow> = sqlx::query_as(
        r#"
        SELECT id, variant_id, transaction_type, quantity_change,
               previous_quantity, new_quantity, reference_order_id,
               notes, created_by, created_at
        FROM inventory_transactions
        WHERE variant_id = $1
        ORDER BY id
        "#,
    )
    .bind(variant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Variant joined with its product, for the stock-level reports.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StockLevelRow {
    pub variant_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub category: String,
    pub variant_type: String,
    pub variant_value: String,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub sku: Option<String>,
}

const STOCK_LEVEL_SELECT: &str = r#"
    SELECT pv.id AS variant_id, p.id AS product_id, p.name AS product_name,
           p.category, pv.variant_type, pv.variant_value,
           pv.stock_quantity, pv.low_stock_threshold, pv.sku
    FROM product_variants pv
    JOIN products p ON p.id = pv.product_id
"#;

pub async fn list_low_stock(pool: &PgPool) -> ApiResult<Vec<StockLevelRow>> {
    let rows: Vec<StockLevelRow> = sqlx::query_as(&format!(
        "{STOCK_LEVEL_SELECT} WHERE pv.stock_quantity > 0 AND pv.stock_quantity <= pv.low_stock_threshold ORDER BY pv.stock_quantity, p.name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_out_of_stock(pool: &PgPool) -> ApiResult<Vec<StockLevelRow>> {
    let rows: Vec<StockLevelRow> = sqlx::query_as(&format!(
        "{STOCK_LEVEL_SELECT} WHERE pv.stock_quantity = 0 ORDER BY p.name, pv.variant_type, pv.variant_value"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
