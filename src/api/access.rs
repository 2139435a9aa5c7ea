/// Access key endpoints
///
/// Redemption is deliberately unauthenticated: a purchase can be unlocked
/// on a different device than the one that paid.
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::ContentType,
    entitlement::access_key::format_key,
    error::{CommerceError, CommerceResult},
};
use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Build access key routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/access/grant", post(grant_access_key))
        .route("/api/access/verify", post(verify_access_key))
        .route("/api/access/deactivate", post(deactivate_access_key))
}

#[derive(Debug, Deserialize, Validate)]
pub struct GrantAccessRequest {
    pub content_id: String,
    pub content_type: ContentType,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct GrantAccessResponse {
    pub access_key: String,
    pub content_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Issue an access key for purchased or owned content
async fn grant_access_key(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<GrantAccessRequest>,
) -> CommerceResult<Json<GrantAccessResponse>> {
    req.validate()
        .map_err(|e| CommerceError::Validation(e.to_string()))?;

    let content = ctx
        .catalog
        .get_content(&req.content_id, req.content_type)
        .await?;

    // The purchaser or the content owner may issue a key
    let owns_content = content.creator_id == auth.user_id;
    let purchased = ctx
        .entitlements
        .has_access(&auth.user_id, &req.content_id)
        .await?;
    if !owns_content && !purchased {
        return Err(CommerceError::Unauthorized(
            "A completed purchase is required to issue an access key".to_string(),
        ));
    }

    let grant = ctx.access_keys.grant(&content, &req.email).await?;

    Ok(Json(GrantAccessResponse {
        access_key: format_key(&grant.access_key),
        content_id: grant.content_id,
        expires_at: grant.expires_at,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyAccessRequest {
    #[validate(email)]
    pub email: String,
    pub access_key: String,
    pub content_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyAccessResponse {
    pub content_id: String,
    pub content_type: ContentType,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Redeem an access key
async fn verify_access_key(
    State(ctx): State<AppContext>,
    Json(req): Json<VerifyAccessRequest>,
) -> CommerceResult<Json<VerifyAccessResponse>> {
    req.validate()
        .map_err(|e| CommerceError::Validation(e.to_string()))?;

    let grant = ctx
        .access_keys
        .verify(&req.email, &req.access_key, &req.content_id)
        .await?;

    Ok(Json(VerifyAccessResponse {
        content_id: grant.content_id,
        content_type: grant.content_type,
        expires_at: grant.expires_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeactivateAccessRequest {
    pub access_key: String,
}

/// Revoke an access key; only the content owner may do so
async fn deactivate_access_key(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<DeactivateAccessRequest>,
) -> CommerceResult<Json<serde_json::Value>> {
    let grant = ctx
        .access_keys
        .get(&req.access_key)
        .await?
        .ok_or(CommerceError::AccessKeyInvalid)?;

    let content = ctx
        .catalog
        .get_content(&grant.content_id, grant.content_type)
        .await?;
    if content.creator_id != auth.user_id {
        return Err(CommerceError::Unauthorized(
            "Only the content owner may deactivate a key".to_string(),
        ));
    }

    ctx.access_keys.deactivate(&req.access_key).await?;

    Ok(Json(serde_json::json!({ "deactivated": true })))
}
