/// Checkout: payment intent issuance
///
/// Computes the charge and revenue split for a content item and opens a
/// gateway transaction scoped to the creator's payout destination. The
/// gateway call happens before the ledger write, so a gateway failure
/// leaves no local state behind.
use crate::{
    catalog::ContentCatalog,
    db::models::ContentType,
    directory::Directory,
    error::{CommerceError, CommerceResult},
    gateway::{CreateTransactionRequest, PaymentGateway, TransactionMetadata},
    ledger::{split::compute_split, NewPurchase, PurchaseManager},
};
use serde::Serialize;
use std::sync::Arc;

/// Client-facing receipt for a newly issued payment intent
#[derive(Debug, Clone, Serialize)]
pub struct IntentReceipt {
    pub transaction_id: String,
    pub client_secret: String,
    pub amount_cents: i64,
    pub currency: String,
}

/// Payment intent issuer
pub struct CheckoutManager {
    catalog: Arc<ContentCatalog>,
    directory: Arc<Directory>,
    purchases: Arc<PurchaseManager>,
    gateway: Arc<dyn PaymentGateway>,
    platform_fee_percent: i64,
}

impl CheckoutManager {
    pub fn new(
        catalog: Arc<ContentCatalog>,
        directory: Arc<Directory>,
        purchases: Arc<PurchaseManager>,
        gateway: Arc<dyn PaymentGateway>,
        platform_fee_percent: i64,
    ) -> Self {
        Self {
            catalog,
            directory,
            purchases,
            gateway,
            platform_fee_percent,
        }
    }

    /// Issue a payment intent for a buyer and content item
    pub async fn create_intent(
        &self,
        buyer_id: &str,
        content_id: &str,
        content_type: ContentType,
    ) -> CommerceResult<IntentReceipt> {
        let content = self.catalog.get_content(content_id, content_type).await?;

        // Early duplicate check for a clean error before touching the
        // gateway; the ledger insert below re-enforces it atomically.
        if self
            .purchases
            .has_active_purchase(buyer_id, content_id, content_type)
            .await?
        {
            return Err(CommerceError::DuplicatePurchase);
        }

        let destination = self.directory.payout_destination(&content.creator_id).await?;

        let (creator_share, platform_share) =
            compute_split(content.price_cents, self.platform_fee_percent);

        let handle = self
            .gateway
            .create_transaction(CreateTransactionRequest {
                amount_cents: content.price_cents,
                currency: content.currency.clone(),
                destination_account: destination,
                fee_cents: platform_share,
                metadata: TransactionMetadata {
                    content_id: content.id.clone(),
                    content_type,
                    buyer_id: buyer_id.to_string(),
                    creator_id: content.creator_id.clone(),
                },
            })
            .await?;

        tracing::info!(
            transaction_id = %handle.transaction_id,
            content_id,
            buyer_id,
            amount_cents = content.price_cents,
            "Opened gateway transaction"
        );

        self.purchases
            .create_pending(NewPurchase {
                buyer_id: buyer_id.to_string(),
                content_id: content.id,
                content_type,
                creator_id: content.creator_id,
                gateway_transaction_id: handle.transaction_id.clone(),
                amount_cents: content.price_cents,
                currency: content.currency.clone(),
                creator_share_cents: creator_share,
                platform_share_cents: platform_share,
            })
            .await?;

        Ok(IntentReceipt {
            transaction_id: handle.transaction_id,
            client_secret: handle.client_secret,
            amount_cents: content.price_cents,
            currency: content.currency,
        })
    }
}
