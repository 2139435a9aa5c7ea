/// Unified error types for the Wayfare ledger service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the ledger service
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Content item lookup failures
    #[error("Content not found: {0}")]
    ContentNotFound(String),

    /// Buyer lookup failures
    #[error("Buyer not found: {0}")]
    BuyerNotFound(String),

    /// No completed, gateway-backed purchase to refund
    #[error("No refundable purchase for this buyer and content")]
    NoRefundablePurchase,

    /// An active purchase already exists for this buyer and content
    #[error("An active purchase already exists for this buyer and content")]
    DuplicatePurchase,

    /// A review from this author already exists for this content
    #[error("A review for this content already exists")]
    DuplicateReview,

    /// Review submitted without a completed purchase
    #[error("A completed purchase is required to review this content")]
    ReviewNotEligible,

    /// Key allocation kept colliding with existing keys
    #[error("Could not allocate a unique access key")]
    AccessKeyCollision,

    /// Access key redemption failed (unknown, inactive, expired, or mismatched)
    #[error("Invalid or expired access key")]
    AccessKeyInvalid,

    /// Creator has no payout destination configured
    #[error("Creator has no payout destination configured")]
    CreatorPayoutNotConfigured,

    /// Purchases granted without the gateway cannot be refunded through it
    #[error("Manual purchases cannot be refunded")]
    ManualPurchaseNotRefundable,

    /// Gateway unreachable or timed out; no local state was changed
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Gateway rejected the request
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Webhook payload failed signature verification
    #[error("Webhook signature verification failed: {0}")]
    WebhookSignature(String),

    /// Amount split no longer sums; the write is aborted
    #[error("Amount split invariant violated: {0}")]
    InvariantViolation(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert CommerceError to an HTTP response
impl IntoResponse for CommerceError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            CommerceError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            CommerceError::Unauthorized(_) => {
                (StatusCode::FORBIDDEN, "Forbidden", self.to_string())
            }
            CommerceError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            CommerceError::ContentNotFound(_) => {
                (StatusCode::NOT_FOUND, "ContentNotFound", self.to_string())
            }
            CommerceError::BuyerNotFound(_) => {
                (StatusCode::NOT_FOUND, "BuyerNotFound", self.to_string())
            }
            CommerceError::NoRefundablePurchase => (
                StatusCode::NOT_FOUND,
                "NoRefundablePurchase",
                self.to_string(),
            ),
            CommerceError::DuplicatePurchase => (
                StatusCode::CONFLICT,
                "DuplicatePurchase",
                self.to_string(),
            ),
            CommerceError::DuplicateReview => {
                (StatusCode::CONFLICT, "DuplicateReview", self.to_string())
            }
            CommerceError::ReviewNotEligible => (
                StatusCode::FORBIDDEN,
                "ReviewNotEligible",
                self.to_string(),
            ),
            CommerceError::AccessKeyCollision => (
                StatusCode::CONFLICT,
                "AccessKeyCollision",
                self.to_string(),
            ),
            CommerceError::AccessKeyInvalid => (
                StatusCode::FORBIDDEN,
                "InvalidAccessKey",
                self.to_string(),
            ),
            CommerceError::CreatorPayoutNotConfigured => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "CreatorPayoutNotConfigured",
                self.to_string(),
            ),
            CommerceError::ManualPurchaseNotRefundable => (
                StatusCode::BAD_REQUEST,
                "ManualPurchaseNotRefundable",
                self.to_string(),
            ),
            CommerceError::GatewayUnavailable(_) => (
                StatusCode::BAD_GATEWAY,
                "GatewayUnavailable",
                self.to_string(),
            ),
            CommerceError::Gateway(_) => {
                (StatusCode::BAD_GATEWAY, "GatewayError", self.to_string())
            }
            // 4xx so the sender stops redelivering a forged payload.
            CommerceError::WebhookSignature(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidSignature",
                self.to_string(),
            ),
            CommerceError::InvariantViolation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InvariantViolation",
                "Amount split invariant violated".to_string(),
            ),
            CommerceError::Database(_) | CommerceError::Internal(_) | CommerceError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ApiErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for ledger operations
pub type CommerceResult<T> = Result<T, CommerceError>;
