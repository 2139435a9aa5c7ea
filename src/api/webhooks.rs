/// Gateway webhook endpoint
use crate::{
    context::AppContext,
    error::{CommerceError, CommerceResult},
    gateway,
};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::json;

/// Build webhook routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/webhooks/gateway", post(gateway_webhook))
}

/// Receive one gateway event delivery
///
/// The raw body is handed to the processor untouched; the signature covers
/// the exact bytes on the wire.
async fn gateway_webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> CommerceResult<Json<serde_json::Value>> {
    let signature = headers
        .get(gateway::SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| CommerceError::WebhookSignature("Missing signature header".to_string()))?;

    let outcome = ctx.webhooks.ingest(&body, signature).await?;
    tracing::debug!(?outcome, "gateway_webhook: delivery processed");

    Ok(Json(json!({ "received": true })))
}
