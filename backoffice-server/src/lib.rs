//! backoffice-server — e-commerce back office
//!
//! REST service over Postgres:
//! - Product catalog with per-variant stock
//! - Atomic order placement against the inventory ledger
//! - Refunds, restocks and order status transitions
//! - Customer loyalty points accrued after orders commit
//! - Admin auth with bcrypt passwords and TOTP 2FA

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod loyalty;
pub mod state;
