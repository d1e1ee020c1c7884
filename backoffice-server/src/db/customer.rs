//! Customers and the loyalty points ledger.
//!
//! Points mirror the inventory ledger: the balance on `customers` is only
//! mutated together with an appended `points_transactions` row, under a row
//! lock, so replaying the ledger reproduces the balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{ApiError, ApiResult};

/// Points earned for an order total: 1 point per whole 100 spent.
pub fn points_for_total(total: f64) -> i32 {
    if total <= 0.0 {
        return 0;
    }
    (total / 100.0).floor() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointsKind {
    Earned,
    Redeemed,
    Adjustment,
}

impl PointsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earned => "earned",
            Self::Redeemed => "redeemed",
            Self::Adjustment => "adjustment",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: i64,
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub total_points: i32,
    pub total_spent: f64,
    pub total_orders: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PointsTransactionRow {
    pub id: i64,
    pub customer_id: i64,
    pub order_id: Option<String>,
    pub transaction_type: String,
    pub points_change: i32,
    pub points_balance: i32,
    pub order_total: Option<f64>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

const CUSTOMER_COLUMNS: &str = r#"
    id, phone, name, email, address, total_points, total_spent, total_orders,
    created_at, updated_at
"#;

/// Find a customer by phone, creating the record on first contact. Provided
/// name, email and address update the record; omitted fields keep their
/// stored values.
pub async fn lookup_or_create(
    pool: &PgPool,
    phone: &str,
    name: Option<&str>,
    email: Option<&str>,
    address: Option<&str>,
) -> ApiResult<CustomerRow> {
    if phone.trim().is_empty() {
        return Err(ApiError::Validation("phone is required".into()));
    }

    let customer: CustomerRow = sqlx::query_as(&format!(
        r#"
        INSERT INTO customers (phone, name, email, address)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (phone) DO UPDATE SET
            name = COALESCE(EXCLUDED.name, customers.name),
            email = COALESCE(EXCLUDED.email, customers.email),
            address = COALESCE(EXCLUDED.address, customers.address),
            updated_at = NOW()
        RETURNING {CUSTOMER_COLUMNS}
        "#
    ))
    .bind(phone)
    .bind(name)
    .bind(email)
    .bind(address)
    .fetch_one(pool)
    .await?;

    Ok(customer)
}

pub async fn list_customers(pool: &PgPool) -> ApiResult<Vec<CustomerRow>> {
    let customers: Vec<CustomerRow> = sqlx::query_as(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(customers)
}

pub async fn get_customer(pool: &PgPool, customer_id: i64) -> ApiResult<CustomerRow> {
    let customer: Option<CustomerRow> = sqlx::query_as(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
    ))
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    customer.ok_or(ApiError::CustomerNotFound(customer_id))
}

/// Apply a signed points delta under a row lock and append the ledger entry.
/// The balance can never go below zero.
pub async fn apply_points(
    pool: &PgPool,
    customer_id: i64,
    delta: i32,
    kind: PointsKind,
    order_id: Option<&str>,
    order_total: Option<f64>,
    notes: Option<&str>,
    actor: &str,
) -> ApiResult<CustomerRow> {
    let mut tx = pool.begin().await?;

    let current: Option<(i32,)> =
        sqlx::query_as("SELECT total_points FROM customers WHERE id = $1 FOR UPDATE")
            .bind(customer_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some((balance,)) = current else {
        return Err(ApiError::CustomerNotFound(customer_id));
    };

    let new_balance = balance + delta;
    if new_balance < 0 {
        if kind == PointsKind::Redeemed {
            return Err(ApiError::InvalidAdjustment(format!(
                "cannot redeem {} points, balance is {balance}",
                -delta
            )));
        }
        return Err(ApiError::InvalidAdjustment(format!(
            "points balance cannot go below zero (current: {balance}, delta: {delta})"
        )));
    }

    let customer: CustomerRow = sqlx::query_as(&format!(
        "UPDATE customers SET total_points = $1, updated_at = NOW() WHERE id = $2 RETURNING {CUSTOMER_COLUMNS}"
    ))
    .bind(new_balance)
    .bind(customer_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO points_transactions (
            customer_id, order_id, transaction_type, points_change,
            points_balance, order_total, notes, created_by
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(customer_id)
    .bind(order_id)
    .bind(kind.as_str())
    .bind(delta)
    .bind(new_balance)
    .bind(order_total)
    .bind(notes)
    .bind(actor)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(customer)
}

pub async fn redeem_points(
    pool: &PgPool,
    customer_id: i64,
    points: i32,
    notes: Option<&str>,
    actor: &str,
) -> ApiResult<CustomerRow> {
    if points <= 0 {
        return Err(ApiError::Validation(
            "redeemed points must be positive".into(),
        ));
    }
    apply_points(
        pool,
        customer_id,
        -points,
        PointsKind::Redeemed,
        None,
        None,
        notes.or(Some("Points redeemed")),
        actor,
    )
    .await
}

pub async fn adjust_points(
    pool: &PgPool,
    customer_id: i64,
    delta: i32,
    notes: Option<&str>,
    actor: &str,
) -> ApiResult<CustomerRow> {
    if delta == 0 {
        return Err(ApiError::Validation(
            "points adjustment cannot be zero".into(),
        ));
    }
    apply_points(
        pool,
        customer_id,
        delta,
        PointsKind::Adjustment,
        None,
        None,
        notes.or(Some("Manual adjustment")),
        actor,
    )
    .await
}

/// Bump lifetime spend and order count after an order commits. Called by the
/// accrual worker, separately from [`apply_points`].
pub async fn record_order_stats(pool: &PgPool, customer_id: i64, total: f64) -> ApiResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE customers
        SET total_spent = total_spent + $1,
            total_orders = total_orders + 1,
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(total)
    .bind(customer_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::CustomerNotFound(customer_id));
    }
    Ok(())
}

pub async fn list_points_transactions(
    pool: &PgPool,
    customer_id: i64,
) -> ApiResult<Vec<PointsTransactionRow>> {
    let rows: Vec<PointsTransactionRow> = sqlx::query_as(
        r#"
        SELECT id, customer_id, order_id, transaction_type, points_change,
               points_balance, order_total, notes, created_by, created_at
        FROM points_transactions
        WHERE customer_id = $1
        ORDER BY id
        "#,
    )
    .bind(customer_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_accrual_is_one_percent_floored() {
        assert_eq!(points_for_total(12500.0), 125);
        assert_eq!(points_for_total(99.99), 0);
        assert_eq!(points_for_total(100.0), 1);
        assert_eq!(points_for_total(199.99), 1);
        assert_eq!(points_for_total(200.0), 2);
    }

    #[test]
    fn test_points_never_negative_for_bad_totals() {
        assert_eq!(points_for_total(0.0), 0);
        assert_eq!(points_for_total(-50.0), 0);
    }

    #[test]
    fn test_points_kind_serde() {
        for kind in [
            PointsKind::Earned,
            PointsKind::Redeemed,
            PointsKind::Adjustment,
        ] {
            let json = serde_json::to_string(&kind).expect("serialize");
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
