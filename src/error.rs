use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("Amount mismatch: requested {requested:.2}, order has {stored:.2}")]
    AmountMismatch { requested: f64, stored: f64 },

    /// Error reported by the payment provider (charge rejected, bad params).
    /// Passed through to the caller so the buyer can correct input.
    #[error("Provider error {code}: {description}")]
    Provider { code: String, description: String },

    /// Transient infrastructure failure, already retried to exhaustion.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// User-facing error strings shared across handlers.
pub mod msg {
    pub const ORDER_NOT_FOUND: &str = "Order not found";
    pub const ALBUM_NOT_FOUND: &str = "Album not found";
    pub const ORDER_HAS_NO_PAYMENT: &str = "Order has no payment attached";
    pub const ORDER_CANCELED: &str = "Order was canceled; start a new checkout";
    pub const MISSING_PAYMENT_OR_ORDER_ID: &str = "paymentId or orderId parameter is required";
    pub const AMBIGUOUS_PAYMENT_AND_ORDER_ID: &str =
        "paymentId and orderId are mutually exclusive";
    pub const INVALID_ORDER_ID: &str = "Invalid orderId format";
    pub const INVALID_PAYMENT_ID: &str = "Invalid paymentId format";
    pub const AMOUNT_TOO_SMALL: &str = "Amount must be at least 0.01";
    pub const MISSING_CUSTOMER_EMAIL: &str = "customerEmail is required";
    pub const PAYMENT_SERVICE_UNAVAILABLE: &str =
        "Payment service unavailable, please try again";
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::AlreadyPaid => (
                StatusCode::CONFLICT,
                "Order is already paid",
                None,
            ),
            AppError::AmountMismatch { .. } => (
                StatusCode::CONFLICT,
                "Amount mismatch",
                Some(self.to_string()),
            ),
            AppError::Provider { code, description } => (
                StatusCode::BAD_REQUEST,
                "Payment rejected by provider",
                Some(format!("{}: {}", code, description)),
            ),
            AppError::Unavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service unavailable",
                    Some(msg::PAYMENT_SERVICE_UNAVAILABLE.to_string()),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Convenience for `Option -> Result` conversions in handlers.
pub trait OptionExt<T> {
    fn or_not_found(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(msg.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
