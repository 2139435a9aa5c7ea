/// Gateway event ingestion
///
/// The gateway delivers events at least once, so every path here must be
/// safe to apply twice: row creation is keyed on the transaction id and
/// transitions are conditional updates. The signature is verified before
/// anything is parsed or written.
use crate::{
    error::{CommerceError, CommerceResult},
    gateway::{self, TransactionMetadata},
    ledger::{split::compute_split, NewPurchase, PurchaseManager},
    metrics,
};
use crate::db::models::PurchaseStatus;
use serde::Deserialize;
use std::sync::Arc;

/// Event envelope delivered by the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: GatewayEventData,
}

/// Event payload
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    pub transaction_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub metadata: TransactionMetadata,
}

/// What ingestion did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A transition was applied or a new row recorded
    Applied,
    /// The event had already been applied; nothing changed
    AlreadyProcessed,
    /// Unrecognized or inapplicable event; logged and skipped
    Ignored,
}

/// Webhook event processor
pub struct WebhookProcessor {
    purchases: Arc<PurchaseManager>,
    webhook_secret: String,
    tolerance_secs: i64,
    platform_fee_percent: i64,
}

impl WebhookProcessor {
    pub fn new(
        purchases: Arc<PurchaseManager>,
        webhook_secret: String,
        tolerance_secs: i64,
        platform_fee_percent: i64,
    ) -> Self {
        Self {
            purchases,
            webhook_secret,
            tolerance_secs,
            platform_fee_percent,
        }
    }

    /// Verify, parse, and apply one delivery
    pub async fn ingest(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> CommerceResult<IngestOutcome> {
        gateway::verify_webhook_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            self.tolerance_secs,
        )?;

        let event: GatewayEvent = serde_json::from_slice(payload)
            .map_err(|e| CommerceError::Validation(format!("Malformed event payload: {}", e)))?;

        let outcome = match event.event_type.as_str() {
            "payment.succeeded" => self.apply_succeeded(&event).await?,
            "payment.failed" => self.apply_failed(&event).await?,
            "payment.refunded" => self.apply_refunded(&event).await?,
            other => {
                tracing::info!(event_id = %event.id, event_type = other, "Ignoring unrecognized gateway event");
                IngestOutcome::Ignored
            }
        };

        metrics::record_webhook_event(&event.event_type, outcome);

        Ok(outcome)
    }

    async fn apply_succeeded(&self, event: &GatewayEvent) -> CommerceResult<IngestOutcome> {
        let data = &event.data;
        let meta = &data.metadata;

        if let Some(existing) = self
            .purchases
            .find_by_transaction(&data.transaction_id)
            .await?
        {
            let changed = self
                .purchases
                .transition(
                    &data.transaction_id,
                    PurchaseStatus::Pending,
                    PurchaseStatus::Completed,
                )
                .await?;

            if changed || existing.status == PurchaseStatus::Completed {
                // Safe to reapply: the access set is keyed, not counted.
                self.purchases
                    .grant_content_access(&existing.content_id, existing.content_type, &existing.buyer_id)
                    .await?;
            }

            if changed {
                metrics::PURCHASES_COMPLETED_TOTAL.inc();
                tracing::info!(
                    transaction_id = %data.transaction_id,
                    buyer_id = %existing.buyer_id,
                    "Purchase completed"
                );
                return Ok(IngestOutcome::Applied);
            }

            tracing::debug!(
                transaction_id = %data.transaction_id,
                status = %existing.status,
                "Succeeded event with no applicable transition"
            );
            return Ok(IngestOutcome::AlreadyProcessed);
        }

        // No local row: the intent write was lost or never made. Create the
        // completed record directly from the metadata attached at issuance.
        let (creator_share, platform_share) =
            compute_split(data.amount_cents, self.platform_fee_percent);

        let created = self
            .purchases
            .create_completed_from_event(NewPurchase {
                buyer_id: meta.buyer_id.clone(),
                content_id: meta.content_id.clone(),
                content_type: meta.content_type,
                creator_id: meta.creator_id.clone(),
                gateway_transaction_id: data.transaction_id.clone(),
                amount_cents: data.amount_cents,
                currency: data.currency.clone(),
                creator_share_cents: creator_share,
                platform_share_cents: platform_share,
            })
            .await;

        match created {
            Ok(Some(record)) => {
                self.purchases
                    .grant_content_access(&record.content_id, record.content_type, &record.buyer_id)
                    .await?;
                metrics::PURCHASES_COMPLETED_TOTAL.inc();
                tracing::info!(
                    transaction_id = %data.transaction_id,
                    buyer_id = %record.buyer_id,
                    "Purchase recorded from event"
                );
                Ok(IngestOutcome::Applied)
            }
            Ok(None) => Ok(IngestOutcome::AlreadyProcessed),
            // The buyer already holds an active purchase under a different
            // transaction; acknowledging stops redelivery.
            Err(CommerceError::DuplicatePurchase) => {
                tracing::warn!(
                    transaction_id = %data.transaction_id,
                    buyer_id = %meta.buyer_id,
                    content_id = %meta.content_id,
                    "Succeeded event for a buyer with an existing active purchase"
                );
                Ok(IngestOutcome::Ignored)
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_failed(&self, event: &GatewayEvent) -> CommerceResult<IngestOutcome> {
        let changed = self
            .purchases
            .transition(
                &event.data.transaction_id,
                PurchaseStatus::Pending,
                PurchaseStatus::Failed,
            )
            .await?;

        if changed {
            tracing::info!(transaction_id = %event.data.transaction_id, "Purchase failed");
            Ok(IngestOutcome::Applied)
        } else {
            Ok(IngestOutcome::AlreadyProcessed)
        }
    }

    async fn apply_refunded(&self, event: &GatewayEvent) -> CommerceResult<IngestOutcome> {
        let changed = self
            .purchases
            .transition(
                &event.data.transaction_id,
                PurchaseStatus::Completed,
                PurchaseStatus::Refunded,
            )
            .await?;

        if changed {
            metrics::REFUNDS_TOTAL.inc();
            tracing::info!(transaction_id = %event.data.transaction_id, "Purchase refunded via event");
            Ok(IngestOutcome::Applied)
        } else {
            Ok(IngestOutcome::AlreadyProcessed)
        }
    }
}
