//! API routes for backoffice-server

pub mod auth;
pub mod customers;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod products;

use axum::routing::{delete, get, post, put};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Storefront surface (no auth)
    let public = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/products", get(products::list_products))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/products/check-stock", post(products::check_stock))
        .route("/api/orders", post(orders::place_order))
        .route("/api/orders", get(orders::list_orders))
        .route("/api/orders/{order_id}", get(orders::get_order))
        .route("/api/customers/lookup", post(customers::lookup))
        .route("/admin/login", post(auth::login))
        .route("/admin/verify-2fa-setup", post(auth::verify_2fa_setup))
        .route("/admin/verify-2fa", post(auth::verify_2fa));

    // Admin surface (bearer session required)
    let protected = Router::new()
        .route("/api/orders/{order_id}/status", put(orders::update_status))
        .route("/api/orders/{order_id}/refund", post(orders::refund))
        .route("/api/inventory/low-stock", get(inventory::low_stock))
        .route("/api/inventory/out-of-stock", get(inventory::out_of_stock))
        .route(
            "/api/inventory/transactions/{variant_id}",
            get(inventory::list_transactions),
        )
        .route("/api/inventory/restock", post(inventory::restock))
        .route("/admin/products", post(products::create_product))
        .route("/admin/products/{id}", put(products::update_product))
        .route("/admin/products/{id}", delete(products::delete_product))
        .route(
            "/admin/products/{id}/variants",
            post(products::create_variant),
        )
        .route("/admin/variants/{id}", put(products::update_variant))
        .route("/admin/variants/{id}", delete(products::delete_variant))
        .route("/admin/customers", get(customers::list))
        .route(
            "/admin/customers/{id}/adjust-points",
            post(customers::adjust_points),
        )
        .route(
            "/api/customers/{id}/award-points",
            post(customers::award_points),
        )
        .route(
            "/api/customers/{id}/redeem-points",
            post(customers::redeem_points),
        )
        .route("/admin/logout", post(auth::logout))
        .route("/admin/change-password", post(auth::change_password))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
