/// Entitlement resolution
///
/// Answers "may this buyer access this content" straight from the ledger.
/// There is deliberately no cache in front of it: eligibility flips the
/// moment a refund lands.

pub mod access_key;

use crate::{error::CommerceResult, ledger::PurchaseManager};
use std::sync::Arc;

pub use access_key::AccessKeyManager;

/// Ledger-backed entitlement checks
#[derive(Clone)]
pub struct EntitlementResolver {
    purchases: Arc<PurchaseManager>,
}

impl EntitlementResolver {
    pub fn new(purchases: Arc<PurchaseManager>) -> Self {
        Self { purchases }
    }

    /// Whether the buyer holds a completed purchase for the content item
    pub async fn has_access(&self, buyer_id: &str, content_id: &str) -> CommerceResult<bool> {
        self.purchases
            .has_completed_purchase(buyer_id, content_id)
            .await
    }
}
