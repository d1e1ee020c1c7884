//! Transactional tests for order placement, refunds and the inventory ledger.
//!
//! Each test runs against its own temporary database with the migrations
//! applied (requires `DATABASE_URL`).

use sqlx::PgPool;

use backoffice_server::db::inventory;
use backoffice_server::db::order::{self, OrderItemRequest, OrderStatus, PlaceOrderRequest};
use backoffice_server::db::product::{self, CreateProductRequest, CreateVariantRequest};
use backoffice_server::error::ApiError;

fn variant_req(value: &str, stock: i32) -> CreateVariantRequest {
    CreateVariantRequest {
        variant_type: "Size".into(),
        variant_value: value.into(),
        stock_quantity: stock,
        low_stock_threshold: None,
        sku: None,
        is_available: true,
        price_modifier: 0.0,
        variant_price: None,
        image_url: None,
    }
}

/// One product, variants Size S (stock 5) and Size M (stock 3).
/// Returns (product_id, s_variant_id, m_variant_id).
async fn seed_catalog(pool: &PgPool) -> (i64, i64, i64) {
    let req = CreateProductRequest {
        name: "Classic Tee".into(),
        category: "Apparel".into(),
        base_price: 2500.0,
        image_url: None,
        description: None,
        is_active: true,
        variants: vec![variant_req("S", 5), variant_req("M", 3)],
    };
    let created = product::create_product(pool, &req, "admin")
        .await
        .expect("seed product");

    let sizes = &created.variants["Size"];
    let find = |value: &str| {
        sizes
            .iter()
            .find(|v| v.variant.variant_value == value)
            .expect("seeded variant")
            .variant
            .id
    };
    (created.product.id, find("S"), find("M"))
}

fn item(product_id: i64, value: &str, quantity: i32) -> OrderItemRequest {
    OrderItemRequest {
        product_id,
        // Lowercase on purpose: resolution is case-insensitive.
        variant_type: "size".into(),
        variant_value: value.to_lowercase(),
        product_name: "Classic Tee".into(),
        variants: None,
        quantity,
        unit_price: 2500.0,
        total_price: 2500.0 * quantity as f64,
    }
}

fn order_req(order_id: &str, items: Vec<OrderItemRequest>) -> PlaceOrderRequest {
    let total: f64 = items.iter().map(|i| i.total_price).sum();
    PlaceOrderRequest {
        order_id: order_id.into(),
        customer_name: "Ann Walker".into(),
        customer_email: None,
        customer_phone: "876-555-0101".into(),
        customer_address: None,
        subtotal: total,
        delivery_fee: 0.0,
        rewards_discount: 0.0,
        total,
        payment_method: None,
        payment_provider: None,
        transaction_id: None,
        payment_status: None,
        delivery_option: None,
        delivery_parish: None,
        usd_amount: None,
        exchange_rate: None,
        order_status: None,
        items,
    }
}

async fn stock_of(pool: &PgPool, variant_id: i64) -> i32 {
    sqlx::query_scalar("SELECT stock_quantity FROM product_variants WHERE id = $1")
        .bind(variant_id)
        .fetch_one(pool)
        .await
        .expect("stock query")
}

#[sqlx::test(migrations = "./migrations")]
async fn test_place_order_decrements_stock_and_ledgers(pool: PgPool) {
    let (product_id, s_id, _) = seed_catalog(&pool).await;

    let placed = order::place_order(&pool, &order_req("TV-1", vec![item(product_id, "S", 2)]), "system")
        .await
        .expect("order should place");
    assert_eq!(placed.order_id, "TV-1");

    assert_eq!(stock_of(&pool, s_id).await, 3);

    // Initial restock entry plus one sale entry, replaying to current stock.
    let ledger = inventory::list_transactions(&pool, s_id)
        .await
        .expect("ledger");
    assert_eq!(ledger.len(), 2);
    assert_eq!(inventory::replay(&ledger), 3);

    let sale = &ledger[1];
    assert_eq!(sale.transaction_type, "sale");
    assert_eq!(sale.quantity_change, -2);
    assert_eq!(sale.reference_order_id.as_deref(), Some("TV-1"));
    assert_eq!(sale.created_by, "system");

    let fetched = order::get_order(&pool, "TV-1").await.expect("order");
    assert_eq!(fetched.order.order_status, "pending");
    assert_eq!(fetched.items.len(), 1);
    assert_eq!(fetched.items[0].quantity, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_failed_item_rolls_back_whole_order(pool: PgPool) {
    let (product_id, s_id, m_id) = seed_catalog(&pool).await;

    // First item would succeed, second exceeds stock. Nothing may survive.
    let err = order::place_order(
        &pool,
        &order_req("TV-2", vec![item(product_id, "S", 2), item(product_id, "M", 99)]),
        "system",
    )
    .await
    .expect_err("order should fail");
    assert!(matches!(err, ApiError::InsufficientStock { available: 3, requested: 99, .. }));

    assert!(matches!(
        order::get_order(&pool, "TV-2").await.expect_err("no order"),
        ApiError::OrderNotFound(_)
    ));
    assert_eq!(stock_of(&pool, s_id).await, 5);
    assert_eq!(stock_of(&pool, m_id).await, 3);

    // No sale entry, only the seeded initial stock.
    let ledger = inventory::list_transactions(&pool, s_id)
        .await
        .expect("ledger");
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].transaction_type, "restock");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_unknown_variant_rolls_back_whole_order(pool: PgPool) {
    let (product_id, s_id, _) = seed_catalog(&pool).await;

    let err = order::place_order(
        &pool,
        &order_req("TV-3", vec![item(product_id, "S", 1), item(product_id, "XL", 1)]),
        "system",
    )
    .await
    .expect_err("order should fail");
    assert!(matches!(err, ApiError::VariantNotFound { .. }));

    assert_eq!(stock_of(&pool, s_id).await, 5);
    assert!(order::get_order(&pool, "TV-3").await.is_err());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_duplicate_order_id_rejected_without_stock_change(pool: PgPool) {
    let (product_id, s_id, _) = seed_catalog(&pool).await;

    order::place_order(&pool, &order_req("TV-4", vec![item(product_id, "S", 1)]), "system")
        .await
        .expect("first order");

    let err = order::place_order(&pool, &order_req("TV-4", vec![item(product_id, "S", 1)]), "system")
        .await
        .expect_err("duplicate should fail");
    assert!(matches!(err, ApiError::DuplicateOrder { .. }));

    // Only the first order's decrement happened.
    assert_eq!(stock_of(&pool, s_id).await, 4);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_refund_restores_exact_quantities_once(pool: PgPool) {
    let (product_id, s_id, m_id) = seed_catalog(&pool).await;

    order::place_order(
        &pool,
        &order_req("TV-5", vec![item(product_id, "S", 2), item(product_id, "M", 1)]),
        "system",
    )
    .await
    .expect("order");
    assert_eq!(stock_of(&pool, s_id).await, 3);
    assert_eq!(stock_of(&pool, m_id).await, 2);

    order::refund_order(&pool, "TV-5", "admin").await.expect("refund");
    assert_eq!(stock_of(&pool, s_id).await, 5);
    assert_eq!(stock_of(&pool, m_id).await, 3);

    let fetched = order::get_order(&pool, "TV-5").await.expect("order");
    assert_eq!(fetched.order.order_status, "refunded");
    assert_eq!(fetched.order.payment_status, "refunded");

    let refund_entry = inventory::list_transactions(&pool, s_id)
        .await
        .expect("ledger")
        .pop()
        .expect("entry");
    assert_eq!(refund_entry.transaction_type, "refund");
    assert_eq!(refund_entry.quantity_change, 2);
    assert_eq!(refund_entry.created_by, "admin");

    // A second refund must fail and must not restore again.
    let err = order::refund_order(&pool, "TV-5", "admin")
        .await
        .expect_err("second refund should fail");
    assert!(matches!(err, ApiError::InvalidAdjustment(ref msg) if msg.contains("already refunded")));
    assert_eq!(stock_of(&pool, s_id).await, 5);
    assert_eq!(stock_of(&pool, m_id).await, 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_status_update_allows_pending_to_refunded(pool: PgPool) {
    let (product_id, _, _) = seed_catalog(&pool).await;
    order::place_order(&pool, &order_req("TV-6", vec![item(product_id, "S", 1)]), "system")
        .await
        .expect("order");

    // Pure status transition: the state machine admits it directly.
    let order = order::update_order_status(&pool, "TV-6", OrderStatus::Refunded)
        .await
        .expect("pending -> refunded is a legal transition");
    assert_eq!(order.order_status, "refunded");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_status_update_rejects_illegal_transition(pool: PgPool) {
    let (product_id, _, _) = seed_catalog(&pool).await;
    order::place_order(&pool, &order_req("TV-7", vec![item(product_id, "S", 1)]), "system")
        .await
        .expect("order");

    order::update_order_status(&pool, "TV-7", OrderStatus::Delivered)
        .await
        .expect("pending -> delivered");

    let err = order::update_order_status(&pool, "TV-7", OrderStatus::Cancelled)
        .await
        .expect_err("delivered -> cancelled is illegal");
    assert!(matches!(err, ApiError::InvalidAdjustment(_)));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_restock_overflow_rejected(pool: PgPool) {
    let (_, s_id, _) = seed_catalog(&pool).await;

    let err = inventory::restock(&pool, s_id, i32::MAX, None, "admin")
        .await
        .expect_err("overflowing restock should fail");
    assert!(matches!(err, ApiError::InvalidAdjustment(_)));

    assert_eq!(stock_of(&pool, s_id).await, 5);
}
