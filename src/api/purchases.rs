/// Purchase listing, entitlement checks, and manual grants
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::{ContentType, PurchaseRecord, PurchaseStatus},
    error::{CommerceError, CommerceResult},
    ledger::split::compute_split,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Build purchase routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/purchases", get(list_purchases))
        .route("/api/purchases/manual", post(manual_grant))
        .route(
            "/api/content/:content_type/:content_id/access",
            get(check_access),
        )
}

#[derive(Debug, Serialize)]
pub struct PurchaseSummary {
    pub content_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PurchaseStatus,
    pub purchased_at: DateTime<Utc>,
}

impl From<PurchaseRecord> for PurchaseSummary {
    fn from(record: PurchaseRecord) -> Self {
        Self {
            content_id: record.content_id,
            amount_cents: record.amount_cents,
            currency: record.currency,
            status: record.status,
            purchased_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PurchaseListResponse {
    pub trips: Vec<PurchaseSummary>,
    pub gotos: Vec<PurchaseSummary>,
}

/// List the authenticated buyer's active purchases, partitioned by type
async fn list_purchases(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> CommerceResult<Json<PurchaseListResponse>> {
    let records = ctx.purchases.list_for_buyer(&auth.user_id).await?;

    let (trips, gotos): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|record| record.content_type == ContentType::Trip);

    Ok(Json(PurchaseListResponse {
        trips: trips.into_iter().map(PurchaseSummary::from).collect(),
        gotos: gotos.into_iter().map(PurchaseSummary::from).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub content_id: String,
    pub has_access: bool,
}

/// Whether the authenticated buyer may access a content item
async fn check_access(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((_content_type, content_id)): Path<(ContentType, String)>,
) -> CommerceResult<Json<AccessResponse>> {
    let has_access = ctx.entitlements.has_access(&auth.user_id, &content_id).await?;

    Ok(Json(AccessResponse {
        content_id,
        has_access,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ManualGrantRequest {
    #[validate(email)]
    pub buyer_email: String,
    pub content_id: String,
    pub content_type: ContentType,
}

/// Grant a purchase without a gateway charge (comp access)
///
/// Only the content owner may comp their own content. The resulting row
/// carries a synthetic transaction id and is excluded from refunds.
async fn manual_grant(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<ManualGrantRequest>,
) -> CommerceResult<Json<PurchaseSummary>> {
    req.validate()
        .map_err(|e| CommerceError::Validation(e.to_string()))?;

    let content = ctx
        .catalog
        .get_content(&req.content_id, req.content_type)
        .await?;

    if content.creator_id != auth.user_id {
        return Err(CommerceError::Unauthorized(
            "Only the content owner may grant access".to_string(),
        ));
    }

    let buyer = ctx
        .directory
        .buyer_by_email(&req.buyer_email)
        .await?
        .ok_or_else(|| CommerceError::BuyerNotFound(req.buyer_email.clone()))?;

    let (creator_share, platform_share) = compute_split(
        content.price_cents,
        ctx.config.gateway.platform_fee_percent,
    );

    let record = ctx
        .purchases
        .create_manual(&buyer.id, &content, creator_share, platform_share)
        .await?;

    tracing::info!(
        creator_id = %auth.user_id,
        buyer_id = %buyer.id,
        content_id = %content.id,
        "manual_grant: access granted without gateway"
    );

    Ok(Json(PurchaseSummary::from(record)))
}
