//! Database operations, one module per resource.
//!
//! Plain async functions over `PgPool`/`PgConnection` with raw parameterized
//! SQL. Multi-statement units open an explicit transaction; ledger writes go
//! through `inventory::adjust_stock` so every stock mutation leaves a log row.

pub mod admin;
pub mod customer;
pub mod inventory;
pub mod order;
pub mod product;

/// True when the error is a Postgres unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
