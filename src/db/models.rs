/// Ledger database models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Synthetic transaction id prefix for purchases granted without the
/// gateway. Such records are never refundable through the gateway.
pub const MANUAL_TRANSACTION_PREFIX: &str = "manual-";

/// Kind of purchasable content
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ContentType {
    Trip,
    Goto,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Trip => "trip",
            ContentType::Goto => "goto",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trip" => Ok(ContentType::Trip),
            "goto" => Ok(ContentType::Goto),
            other => Err(format!("Unknown content type: {}", other)),
        }
    }
}

/// Purchase record status
///
/// Legal transitions: pending -> completed, pending -> failed,
/// completed -> refunded. failed and refunded are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
            PurchaseStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchase record in the ledger
///
/// Rows are never deleted; a refund is a status change, so entitlement
/// history stays auditable.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: String,
    pub buyer_id: String,
    pub content_id: String,
    pub content_type: ContentType,
    pub creator_id: String,
    pub gateway_transaction_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub creator_share_cents: i64,
    pub platform_share_cents: i64,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseRecord {
    /// Whether this purchase was granted without the gateway
    pub fn is_manual(&self) -> bool {
        self.gateway_transaction_id
            .starts_with(MANUAL_TRANSACTION_PREFIX)
    }
}

/// Purchasable content item in the catalog
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub content_type: ContentType,
    pub title: String,
    pub price_cents: i64,
    pub currency: String,
    pub creator_id: String,
    pub avg_rating: f64,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Email-bound access grant, independent of session authentication
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccessGrant {
    pub access_key: String,
    pub content_id: String,
    pub content_type: ContentType,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

/// Review attached to a content item
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub content_id: String,
    pub content_type: ContentType,
    pub author_id: String,
    pub rating: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Buyer record, provisioned by the platform's auth service
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Buyer {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Creator payout profile
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub creator_id: String,
    pub payout_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_round_trips() {
        assert_eq!("trip".parse::<ContentType>().unwrap(), ContentType::Trip);
        assert_eq!("goto".parse::<ContentType>().unwrap(), ContentType::Goto);
        assert!("video".parse::<ContentType>().is_err());
    }

    #[test]
    fn manual_prefix_is_detected() {
        let mut record = PurchaseRecord {
            id: "p1".to_string(),
            buyer_id: "b1".to_string(),
            content_id: "c1".to_string(),
            content_type: ContentType::Trip,
            creator_id: "cr1".to_string(),
            gateway_transaction_id: format!("{}abc", MANUAL_TRANSACTION_PREFIX),
            amount_cents: 999,
            currency: "USD".to_string(),
            creator_share_cents: 799,
            platform_share_cents: 200,
            status: PurchaseStatus::Completed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(record.is_manual());

        record.gateway_transaction_id = "tx_123".to_string();
        assert!(!record.is_manual());
    }
}
