//! Order transaction coordinator.
//!
//! Order placement, refund and status transitions. Placement and refund each
//! run as one database transaction: the order rows and every ledger decrement
//! commit together or not at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{ApiError, ApiResult};

use super::inventory::{self, TransactionKind};
use super::is_unique_violation;

/// Order lifecycle. Forward-only: `pending` fans out, `delivered` can still be
/// refunded, `cancelled` and `refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> ApiResult<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(ApiError::Internal(format!("unknown order status: {other}"))),
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Delivered)
                | (Self::Pending, Self::Cancelled)
                | (Self::Pending, Self::Refunded)
                | (Self::Delivered, Self::Refunded)
        )
    }
}

/// Incoming order request: customer snapshot, computed totals and line items.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    /// Client-supplied external order identifier, unique.
    pub order_id: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub subtotal: f64,
    #[serde(default)]
    pub delivery_fee: f64,
    #[serde(default)]
    pub rewards_discount: f64,
    pub total: f64,
    pub payment_method: Option<String>,
    pub payment_provider: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_status: Option<String>,
    pub delivery_option: Option<String>,
    pub delivery_parish: Option<String>,
    pub usd_amount: Option<f64>,
    pub exchange_rate: Option<f64>,
    pub order_status: Option<OrderStatus>,
    pub items: Vec<OrderItemRequest>,
}

/// One requested line item. The variant is addressed by its dimension name and
/// value ("Colour" / "Black"), matched case-insensitively.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub variant_type: String,
    pub variant_value: String,
    pub product_name: String,
    /// Free-form snapshot of the selected options, stored as-is.
    pub variants: Option<serde_json::Value>,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order_id: String,
    pub db_order_id: i64,
}

/// Persisted order header.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub order_id: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub rewards_discount: f64,
    pub total: f64,
    pub payment_method: Option<String>,
    pub payment_provider: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_status: String,
    pub delivery_option: Option<String>,
    pub delivery_parish: Option<String>,
    pub usd_amount: Option<f64>,
    pub exchange_rate: Option<f64>,
    pub order_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItemRow {
    #[serde(skip_serializing)]
    pub order_id: i64,
    pub product_id: i64,
    pub variant_id: i64,
    pub product_name: String,
    pub variant_details: Option<serde_json::Value>,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
}

const ORDER_COLUMNS: &str = r#"
    id, order_id, customer_name, customer_email, customer_phone, customer_address,
    subtotal, delivery_fee, rewards_discount, total,
    payment_method, payment_provider, transaction_id, payment_status,
    delivery_option, delivery_parish, usd_amount, exchange_rate,
    order_status, created_at, updated_at
"#;

/// Place an order: header, line-item snapshots and ledger decrements in one
/// atomic unit. Any failure discards everything — no partial order is ever
/// observable.
pub async fn place_order(
    pool: &PgPool,
    req: &PlaceOrderRequest,
    actor: &str,
) -> ApiResult<PlacedOrder> {
    if req.items.is_empty() {
        return Err(ApiError::Validation(
            "order must contain at least one item".into(),
        ));
    }
    for item in &req.items {
        if item.quantity <= 0 {
            return Err(ApiError::Validation(format!(
                "quantity for {} must be positive",
                item.product_name
            )));
        }
    }

    let status = req.order_status.unwrap_or(OrderStatus::Pending);
    let payment_status = req.payment_status.as_deref().unwrap_or("pending");

    let mut tx = pool.begin().await?;

    // The unique index on orders.order_id is the duplicate check: no window
    // between a pre-query and the insert.
    let header: Result<(i64,), sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO orders (
            order_id, customer_name, customer_email, customer_phone,
            customer_address, subtotal, delivery_fee, rewards_discount, total,
            payment_method, payment_provider, transaction_id, payment_status,
            delivery_option, delivery_parish, usd_amount, exchange_rate,
            order_status
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING id
        "#,
    )
    .bind(&req.order_id)
    .bind(&req.customer_name)
    .bind(&req.customer_email)
    .bind(&req.customer_phone)
    .bind(&req.customer_address)
    .bind(req.subtotal)
    .bind(req.delivery_fee)
    .bind(req.rewards_discount)
    .bind(req.total)
    .bind(&req.payment_method)
    .bind(&req.payment_provider)
    .bind(&req.transaction_id)
    .bind(payment_status)
    .bind(&req.delivery_option)
    .bind(&req.delivery_parish)
    .bind(req.usd_amount)
    .bind(req.exchange_rate)
    .bind(status.as_str())
    .fetch_one(&mut *tx)
    .await;

    let (db_order_id,) = header.map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::DuplicateOrder {
                order_id: req.order_id.clone(),
            }
        } else {
            e.into()
        }
    })?;

    // Items are processed sequentially in request order so a failure on item N
    // aborts 1..N-1 cleanly and the error names the first failing item.
    for item in &req.items {
        let variant: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM product_variants
            WHERE product_id = $1
              AND LOWER(variant_type) = LOWER($2)
              AND LOWER(variant_value) = LOWER($3)
            "#,
        )
        .bind(item.product_id)
        .bind(&item.variant_type)
        .bind(&item.variant_value)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((variant_id,)) = variant else {
            return Err(ApiError::VariantNotFound {
                product_id: item.product_id,
                variant_type: item.variant_type.clone(),
                variant_value: item.variant_value.clone(),
            });
        };

        sqlx::query(
            r#"
            INSERT INTO order_items (
                order_id, product_id, variant_id, product_name,
                variant_details, quantity, unit_price, total_price
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(db_order_id)
        .bind(item.product_id)
        .bind(variant_id)
        .bind(&item.product_name)
        .bind(&item.variants)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .execute(&mut *tx)
        .await?;

        inventory::adjust_stock(
            &mut tx,
            variant_id,
            -item.quantity,
            TransactionKind::Sale,
            Some(&req.order_id),
            Some(&format!("Order placed by {}", req.customer_name)),
            actor,
        )
        .await?;
    }

    tx.commit().await?;

    Ok(PlacedOrder {
        order_id: req.order_id.clone(),
        db_order_id,
    })
}

/// Refund an order: restore every sold quantity through the ledger and flip
/// the order to `refunded`, atomically. Refunding an already-refunded order
/// fails without touching stock.
pub async fn refund_order(pool: &PgPool, order_id: &str, actor: &str) -> ApiResult<()> {
    let mut tx = pool.begin().await?;

    let row: Option<(i64, String)> =
        sqlx::query_as("SELECT id, order_status FROM orders WHERE order_id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some((db_order_id, current)) = row else {
        return Err(ApiError::OrderNotFound(order_id.to_string()));
    };

    let current = OrderStatus::parse(&current)?;
    if current == OrderStatus::Refunded {
        return Err(ApiError::InvalidAdjustment(format!(
            "order {order_id} is already refunded"
        )));
    }
    if !current.can_transition_to(OrderStatus::Refunded) {
        return Err(ApiError::InvalidAdjustment(format!(
            "cannot refund order {order_id} in status {}",
            current.as_str()
        )));
    }

    let items: Vec<(i64, i32)> =
        sqlx::query_as("SELECT variant_id, quantity FROM order_items WHERE order_id = $1")
            .bind(db_order_id)
            .fetch_all(&mut *tx)
            .await?;

    for (variant_id, quantity) in items {
        inventory::adjust_stock(
            &mut tx,
            variant_id,
            quantity,
            TransactionKind::Refund,
            Some(order_id),
            Some("Order refunded"),
            actor,
        )
        .await?;
    }

    sqlx::query(
        "UPDATE orders SET order_status = 'refunded', payment_status = 'refunded', updated_at = NOW() WHERE id = $1",
    )
    .bind(db_order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Pure status transition, validated against the state machine. No ledger
/// interaction.
pub async fn update_order_status(
    pool: &PgPool,
    order_id: &str,
    new_status: OrderStatus,
) -> ApiResult<OrderRow> {
    let mut tx = pool.begin().await?;

    let current: Option<(String,)> =
        sqlx::query_as("SELECT order_status FROM orders WHERE order_id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some((current,)) = current else {
        return Err(ApiError::OrderNotFound(order_id.to_string()));
    };

    let current = OrderStatus::parse(&current)?;
    if !current.can_transition_to(new_status) {
        return Err(ApiError::InvalidAdjustment(format!(
            "cannot change order {order_id} from {} to {}",
            current.as_str(),
            new_status.as_str()
        )));
    }

    let order: OrderRow = sqlx::query_as(&format!(
        "UPDATE orders SET order_status = $1, updated_at = NOW() WHERE order_id = $2 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(new_status.as_str())
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(order)
}

/// All orders with their items, newest first.
pub async fn list_orders(pool: &PgPool) -> ApiResult<Vec<OrderWithItems>> {
    let orders: Vec<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;

    if orders.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    let items: Vec<OrderItemRow> = sqlx::query_as(
        r#"
        SELECT order_id, product_id, variant_id, product_name,
               variant_details, quantity, unit_price, total_price
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut item_map: std::collections::HashMap<i64, Vec<OrderItemRow>> =
        std::collections::HashMap::new();
    for item in items {
        item_map.entry(item.order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderWithItems {
            items: item_map.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

/// One order by its external id, with items.
pub async fn get_order(pool: &PgPool, order_id: &str) -> ApiResult<OrderWithItems> {
    let order: Option<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    let Some(order) = order else {
        return Err(ApiError::OrderNotFound(order_id.to_string()));
    };

    let items: Vec<OrderItemRow> = sqlx::query_as(
        r#"
        SELECT order_id, product_id, variant_id, product_name,
               variant_details, quantity, unit_price, total_price
        FROM order_items
        WHERE order_id = $1
        ORDER BY id
        "#,
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    Ok(OrderWithItems { order, items })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_fans_out() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn test_delivered_can_only_be_refunded() {
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            for next in [
                OrderStatus::Pending,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
                OrderStatus::Refunded,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_no_transition_reenters_pending() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert!(!status.can_transition_to(OrderStatus::Pending));
        }
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(
                OrderStatus::parse(status.as_str()).expect("round trip"),
                status
            );
        }
        assert!(OrderStatus::parse("shipped").is_err());
    }

    #[test]
    fn test_status_serde_uses_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Refunded).expect("serialize");
        assert_eq!(json, "\"refunded\"");
        let back: OrderStatus = serde_json::from_str("\"pending\"").expect("deserialize");
        assert_eq!(back, OrderStatus::Pending);
    }
}
