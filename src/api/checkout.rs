/// Checkout endpoints
use crate::{
    auth::AuthContext,
    checkout::IntentReceipt,
    context::AppContext,
    db::models::ContentType,
    error::CommerceResult,
};
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

/// Build checkout routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/checkout", post(create_intent))
}

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub content_id: String,
    pub content_type: ContentType,
}

/// Issue a payment intent for the authenticated buyer
async fn create_intent(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<CreateIntentRequest>,
) -> CommerceResult<Json<IntentReceipt>> {
    tracing::debug!(
        buyer_id = %auth.user_id,
        content_id = %req.content_id,
        "create_intent: issuing payment intent"
    );

    let receipt = ctx
        .checkout
        .create_intent(&auth.user_id, &req.content_id, req.content_type)
        .await?;

    Ok(Json(receipt))
}
