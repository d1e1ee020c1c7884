//! Unified error type for the back-office API.
//!
//! Every handler and db function returns `Result<_, ApiError>` so failures
//! propagate with `?` and reach the client as a structured
//! `{"success": false, "error": ...}` payload with a status code mirroring
//! the failure kind.

use axum::Json;
use axum::response::IntoResponse;
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No variant matches the (product, dimension, value) selector.
    #[error(
        "Variant not found for product {product_id}, type: {variant_type}, value: {variant_value}"
    )]
    VariantNotFound {
        product_id: i64,
        variant_type: String,
        variant_value: String,
    },

    /// A sale would drive stock below zero. Names the product and the counts
    /// so the caller can reduce the quantity instead of retrying blindly.
    #[error("Insufficient stock for {product_name}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product_name: String,
        available: i32,
        requested: i32,
    },

    /// The client-supplied external order id has already been used.
    #[error("Order {order_id} already exists")]
    DuplicateOrder { order_id: String },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(i64),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// Generic missing resource (variant by id, admin account, ...).
    #[error("{0} not found")]
    NotFound(String),

    /// An adjustment that would violate a ledger invariant: negative stock
    /// outside a sale, negative points balance, or a forbidden order-status
    /// transition.
    #[error("Invalid adjustment: {0}")]
    InvalidAdjustment(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// Storage failure: always logged and surfaced as 500, never swallowed.
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code mirroring the failure kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 404 Not Found
            Self::VariantNotFound { .. }
            | Self::OrderNotFound(_)
            | Self::CustomerNotFound(_)
            | Self::ProductNotFound(_)
            | Self::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::DuplicateOrder { .. } | Self::Conflict(_) => StatusCode::CONFLICT,

            // 422 Unprocessable Entity (business-rule violations)
            Self::InsufficientStock { .. } | Self::InvalidAdjustment(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            // 400 Bad Request
            Self::Validation(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            Self::Unauthorized => StatusCode::UNAUTHORIZED,

            // 500 Internal Server Error
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        // Storage failures carry driver detail that belongs in the log, not
        // on the wire.
        let message = match &self {
            ApiError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Database error".to_string()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };
        (status, Json(body)).into_response()
    }
}

/// Convenience alias for handler and service results.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        assert_eq!(
            ApiError::OrderNotFound("TV-1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::CustomerNotFound(7).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::VariantNotFound {
                product_id: 1,
                variant_type: "Size".into(),
                variant_value: "M".into(),
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_conflict_status() {
        assert_eq!(
            ApiError::DuplicateOrder {
                order_id: "TV-1".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Conflict("Variant".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_business_rule_status() {
        assert_eq!(
            ApiError::InsufficientStock {
                product_name: "Tee".into(),
                available: 2,
                requested: 5,
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::InvalidAdjustment("points cannot go negative".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_insufficient_stock_message_names_counts() {
        let err = ApiError::InsufficientStock {
            product_name: "Classic Tee".into(),
            available: 2,
            requested: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("Classic Tee"));
        assert!(msg.contains("Available: 2"));
        assert!(msg.contains("Requested: 5"));
    }

    #[test]
    fn test_unauthorized_and_validation_status() {
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Validation("items required".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
