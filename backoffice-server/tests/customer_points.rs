//! Transactional tests for customer lookup and the points ledger.

use sqlx::PgPool;

use backoffice_server::db::customer::{self, PointsKind};
use backoffice_server::error::ApiError;

#[sqlx::test(migrations = "./migrations")]
async fn test_lookup_updates_provided_contact_info(pool: PgPool) {
    let first = customer::lookup_or_create(&pool, "876-555-0101", Some("Ann"), None, None)
        .await
        .expect("create");
    assert_eq!(first.name.as_deref(), Some("Ann"));
    assert_eq!(first.email, None);

    // Provided values win over stored ones.
    let second = customer::lookup_or_create(
        &pool,
        "876-555-0101",
        Some("Anne Walker"),
        Some("anne@example.com"),
        None,
    )
    .await
    .expect("update");
    assert_eq!(second.id, first.id);
    assert_eq!(second.name.as_deref(), Some("Anne Walker"));
    assert_eq!(second.email.as_deref(), Some("anne@example.com"));

    // Omitted fields keep their stored values.
    let third = customer::lookup_or_create(&pool, "876-555-0101", None, None, None)
        .await
        .expect("lookup");
    assert_eq!(third.name.as_deref(), Some("Anne Walker"));
    assert_eq!(third.email.as_deref(), Some("anne@example.com"));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_award_points_bumps_balance_and_stats(pool: PgPool) {
    let cust = customer::lookup_or_create(&pool, "876-555-0102", Some("Bob"), None, None)
        .await
        .expect("create");

    customer::record_order_stats(&pool, cust.id, 12500.0)
        .await
        .expect("stats");
    let updated = customer::apply_points(
        &pool,
        cust.id,
        customer::points_for_total(12500.0),
        PointsKind::Earned,
        Some("TV-1"),
        Some(12500.0),
        Some("1% cashback on order"),
        "admin",
    )
    .await
    .expect("award");

    assert_eq!(updated.total_points, 125);
    assert_eq!(updated.total_spent, 12500.0);
    assert_eq!(updated.total_orders, 1);

    let ledger = customer::list_points_transactions(&pool, cust.id)
        .await
        .expect("ledger");
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].transaction_type, "earned");
    assert_eq!(ledger[0].points_change, 125);
    assert_eq!(ledger[0].points_balance, 125);
    assert_eq!(ledger[0].order_id.as_deref(), Some("TV-1"));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_redeem_cannot_exceed_balance(pool: PgPool) {
    let cust = customer::lookup_or_create(&pool, "876-555-0103", None, None, None)
        .await
        .expect("create");
    customer::apply_points(&pool, cust.id, 50, PointsKind::Earned, None, None, None, "admin")
        .await
        .expect("seed points");

    let err = customer::redeem_points(&pool, cust.id, 80, None, "admin")
        .await
        .expect_err("over-redemption should fail");
    assert!(matches!(err, ApiError::InvalidAdjustment(_)));

    let after = customer::get_customer(&pool, cust.id).await.expect("customer");
    assert_eq!(after.total_points, 50);

    let redeemed = customer::redeem_points(&pool, cust.id, 30, None, "admin")
        .await
        .expect("redeem within balance");
    assert_eq!(redeemed.total_points, 20);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_missing_customer_is_reported(pool: PgPool) {
    let err = customer::adjust_points(&pool, 9999, 10, None, "admin")
        .await
        .expect_err("no such customer");
    assert!(matches!(err, ApiError::CustomerNotFound(9999)));
}
