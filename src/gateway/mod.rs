/// Payment gateway client
///
/// The gateway is an opaque external service reachable over HTTP that can
/// open transactions, issue refunds, and deliver signed event callbacks.
/// Components depend on the `PaymentGateway` trait so tests can substitute
/// an in-process double.
use crate::{
    config::GatewayConfig,
    db::models::ContentType,
    error::{CommerceError, CommerceResult},
};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature, `t=<unix>,v1=<hex digest>`
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Reconciliation metadata attached to every gateway transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub content_id: String,
    pub content_type: ContentType,
    pub buyer_id: String,
    pub creator_id: String,
}

/// Request to open a gateway transaction
#[derive(Debug, Clone, Serialize)]
pub struct CreateTransactionRequest {
    pub amount_cents: i64,
    pub currency: String,
    /// Creator payout destination the charge is scoped to
    pub destination_account: String,
    /// Platform share withheld as an application fee
    pub fee_cents: i64,
    pub metadata: TransactionMetadata,
}

/// Client-usable handle for a newly opened transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionHandle {
    pub transaction_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    refund_id: String,
}

/// Payment gateway operations
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a transaction scoped to a creator's payout destination
    async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> CommerceResult<TransactionHandle>;

    /// Refund a previously completed transaction, returning the refund id
    async fn create_refund(&self, transaction_id: &str) -> CommerceResult<String>;
}

/// HTTP implementation of the gateway client
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    /// Create a new gateway client with a bounded request timeout
    pub fn new(config: &GatewayConfig) -> CommerceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CommerceError::Internal(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn map_transport_error(e: reqwest::Error) -> CommerceError {
        // A timed-out call is treated as failed-not-applied; callers make
        // no local state change, so retries are safe.
        if e.is_timeout() || e.is_connect() {
            CommerceError::GatewayUnavailable(e.to_string())
        } else {
            CommerceError::Gateway(e.to_string())
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> CommerceResult<TransactionHandle> {
        let url = format!("{}/v1/transactions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CommerceError::Gateway(format!(
                "Transaction creation returned {}: {}",
                status, body
            )));
        }

        response
            .json::<TransactionHandle>()
            .await
            .map_err(|e| CommerceError::Gateway(format!("Malformed gateway response: {}", e)))
    }

    async fn create_refund(&self, transaction_id: &str) -> CommerceResult<String> {
        let url = format!("{}/v1/refunds", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "transaction_id": transaction_id }))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CommerceError::Gateway(format!(
                "Refund returned {}: {}",
                status, body
            )));
        }

        let refund = response
            .json::<RefundResponse>()
            .await
            .map_err(|e| CommerceError::Gateway(format!("Malformed gateway response: {}", e)))?;

        Ok(refund.refund_id)
    }
}

/// Verify the HMAC-SHA256 signature of a webhook payload
///
/// The signed message is `<timestamp>.<payload>`. Timestamps outside the
/// tolerance window are rejected to stop replay of captured deliveries.
pub fn verify_webhook_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    tolerance_secs: i64,
) -> CommerceResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut digest_hex: Option<&str> = None;

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse().ok();
            }
            Some(("v1", value)) => {
                digest_hex = Some(value);
            }
            _ => {} // Unknown scheme versions are skipped
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| CommerceError::WebhookSignature("Missing timestamp".to_string()))?;
    let digest_hex = digest_hex
        .ok_or_else(|| CommerceError::WebhookSignature("Missing v1 digest".to_string()))?;

    let age = (Utc::now().timestamp() - timestamp).abs();
    if age > tolerance_secs {
        return Err(CommerceError::WebhookSignature(format!(
            "Timestamp outside tolerance window ({}s old)",
            age
        )));
    }

    let digest = hex::decode(digest_hex)
        .map_err(|_| CommerceError::WebhookSignature("Digest is not hex".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CommerceError::Internal(format!("HMAC init failed: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Constant-time comparison
    mac.verify_slice(&digest)
        .map_err(|_| CommerceError::WebhookSignature("Digest mismatch".to_string()))
}

/// Produce a signature header for a payload, as the gateway would
pub fn sign_webhook_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    #[test]
    fn valid_signature_is_accepted() {
        let payload = b"{\"type\":\"payment.succeeded\"}";
        let now = Utc::now().timestamp();
        let header = sign_webhook_payload(SECRET, payload, now);

        assert!(verify_webhook_signature(SECRET, payload, &header, 300).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = b"{\"type\":\"payment.succeeded\"}";
        let now = Utc::now().timestamp();
        let header = sign_webhook_payload("wrong_secret", payload, now);

        let err = verify_webhook_signature(SECRET, payload, &header, 300).unwrap_err();
        assert!(matches!(err, CommerceError::WebhookSignature(_)));
    }

    #[test]
    fn modified_payload_is_rejected() {
        let payload = b"{\"type\":\"payment.succeeded\"}";
        let tampered = b"{\"type\":\"payment.succeeded\",\"amount_cents\":0}";
        let now = Utc::now().timestamp();
        let header = sign_webhook_payload(SECRET, payload, now);

        assert!(verify_webhook_signature(SECRET, tampered, &header, 300).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = b"{}";
        let stale = Utc::now().timestamp() - 600;
        let header = sign_webhook_payload(SECRET, payload, stale);

        let err = verify_webhook_signature(SECRET, payload, &header, 300).unwrap_err();
        assert!(matches!(err, CommerceError::WebhookSignature(_)));
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(verify_webhook_signature(SECRET, b"{}", "v1=deadbeef", 300).is_err());
        assert!(verify_webhook_signature(SECRET, b"{}", "t=notanumber,v1=aa", 300).is_err());
        assert!(verify_webhook_signature(SECRET, b"{}", "", 300).is_err());
    }
}
