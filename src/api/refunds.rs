/// Refund endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::{ContentType, PurchaseStatus},
    error::{CommerceError, CommerceResult},
    refunds::RefundInput,
};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Build refund routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/refunds", post(create_refund))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequest {
    #[validate(email)]
    pub buyer_email: String,
    pub content_type: ContentType,
    #[validate(length(min = 1))]
    pub content_title: String,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub gateway_transaction_id: String,
    pub status: PurchaseStatus,
    pub amount_cents: i64,
    pub currency: String,
}

/// Refund a buyer's purchase of the authenticated creator's content
async fn create_refund(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<RefundRequest>,
) -> CommerceResult<Json<RefundResponse>> {
    req.validate()
        .map_err(|e| CommerceError::Validation(e.to_string()))?;

    tracing::info!(
        creator_id = %auth.user_id,
        content_title = %req.content_title,
        "create_refund: refund requested"
    );

    let record = ctx
        .refunds
        .refund(
            &auth.user_id,
            RefundInput {
                buyer_email: req.buyer_email,
                content_type: req.content_type,
                content_title: req.content_title,
            },
        )
        .await?;

    Ok(Json(RefundResponse {
        gateway_transaction_id: record.gateway_transaction_id,
        status: record.status,
        amount_cents: record.amount_cents,
        currency: record.currency,
    }))
}
