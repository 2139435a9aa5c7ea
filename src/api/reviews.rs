/// Review endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::{ContentType, Review},
    error::{CommerceError, CommerceResult},
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

/// Build review routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/content/:content_type/:content_id/reviews",
            post(submit_review).get(list_reviews),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i64,
    #[validate(length(min = 1, max = 5000))]
    pub body: String,
}

/// Submit a review for a purchased content item
async fn submit_review(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((content_type, content_id)): Path<(ContentType, String)>,
    Json(req): Json<CreateReviewRequest>,
) -> CommerceResult<Json<Review>> {
    req.validate()
        .map_err(|e| CommerceError::Validation(e.to_string()))?;

    let review = ctx
        .reviews
        .submit(&auth.user_id, &content_id, content_type, req.rating, req.body)
        .await?;

    Ok(Json(review))
}

/// List reviews for a content item
async fn list_reviews(
    State(ctx): State<AppContext>,
    Path((content_type, content_id)): Path<(ContentType, String)>,
) -> CommerceResult<Json<Vec<Review>>> {
    let reviews = ctx.reviews.list_for_content(&content_id, content_type).await?;
    Ok(Json(reviews))
}
