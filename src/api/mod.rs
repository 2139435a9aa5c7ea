/// API routes and handlers
pub mod access;
pub mod checkout;
pub mod middleware;
pub mod purchases;
pub mod refunds;
pub mod reviews;
pub mod webhooks;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(checkout::routes())
        .merge(webhooks::routes())
        .merge(refunds::routes())
        .merge(purchases::routes())
        .merge(reviews::routes())
        .merge(access::routes())
}
