/// Purchase ledger
///
/// The authoritative store of purchase records. Uniqueness ("one active
/// purchase per buyer and content") and the amount-split invariant are
/// enforced at the storage layer, so concurrent writers cannot race past
/// an application-level check.

pub mod split;

use crate::{
    db::models::{
        ContentItem, ContentType, PurchaseRecord, PurchaseStatus, MANUAL_TRANSACTION_PREFIX,
    },
    error::{CommerceError, CommerceResult},
};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Fields for a new ledger row
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub buyer_id: String,
    pub content_id: String,
    pub content_type: ContentType,
    pub creator_id: String,
    pub gateway_transaction_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub creator_share_cents: i64,
    pub platform_share_cents: i64,
}

impl NewPurchase {
    fn check_split(&self) -> CommerceResult<()> {
        if self.creator_share_cents + self.platform_share_cents != self.amount_cents {
            return Err(CommerceError::InvariantViolation(format!(
                "{} + {} != {}",
                self.creator_share_cents, self.platform_share_cents, self.amount_cents
            )));
        }
        Ok(())
    }
}

/// Purchase ledger service
#[derive(Clone)]
pub struct PurchaseManager {
    db: SqlitePool,
}

impl PurchaseManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a pending purchase record for a freshly opened transaction
    pub async fn create_pending(&self, new: NewPurchase) -> CommerceResult<PurchaseRecord> {
        self.insert(new, PurchaseStatus::Pending).await
    }

    /// Create a completed record directly from webhook metadata
    ///
    /// Used when a "succeeded" event arrives for a transaction with no
    /// local row. Keyed on the transaction id: redelivery inserts nothing
    /// and returns `None`.
    pub async fn create_completed_from_event(
        &self,
        new: NewPurchase,
    ) -> CommerceResult<Option<PurchaseRecord>> {
        new.check_split()?;

        if self
            .find_by_transaction(&new.gateway_transaction_id)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO purchase_record
                (id, buyer_id, content_id, content_type, creator_id,
                 gateway_transaction_id, amount_cents, currency,
                 creator_share_cents, platform_share_cents, status,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (gateway_transaction_id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(&new.buyer_id)
        .bind(&new.content_id)
        .bind(new.content_type)
        .bind(&new.creator_id)
        .bind(&new.gateway_transaction_id)
        .bind(new.amount_cents)
        .bind(&new.currency)
        .bind(new.creator_share_cents)
        .bind(new.platform_share_cents)
        .bind(PurchaseStatus::Completed)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(Self::map_insert_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let record = self
            .find_by_transaction(&new.gateway_transaction_id)
            .await?
            .ok_or_else(|| {
                CommerceError::Internal("Inserted purchase row not found".to_string())
            })?;

        Ok(Some(record))
    }

    /// Grant a purchase without the gateway (comp access, promotions)
    ///
    /// The synthetic transaction id marks the row as ineligible for
    /// gateway-mediated refunds.
    pub async fn create_manual(
        &self,
        buyer_id: &str,
        content: &ContentItem,
        creator_share_cents: i64,
        platform_share_cents: i64,
    ) -> CommerceResult<PurchaseRecord> {
        let new = NewPurchase {
            buyer_id: buyer_id.to_string(),
            content_id: content.id.clone(),
            content_type: content.content_type,
            creator_id: content.creator_id.clone(),
            gateway_transaction_id: format!("{}{}", MANUAL_TRANSACTION_PREFIX, Uuid::new_v4()),
            amount_cents: content.price_cents,
            currency: content.currency.clone(),
            creator_share_cents,
            platform_share_cents,
        };

        let record = self.insert(new, PurchaseStatus::Completed).await?;
        self.grant_content_access(&record.content_id, record.content_type, &record.buyer_id)
            .await?;

        Ok(record)
    }

    async fn insert(
        &self,
        new: NewPurchase,
        status: PurchaseStatus,
    ) -> CommerceResult<PurchaseRecord> {
        new.check_split()?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO purchase_record
                (id, buyer_id, content_id, content_type, creator_id,
                 gateway_transaction_id, amount_cents, currency,
                 creator_share_cents, platform_share_cents, status,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.buyer_id)
        .bind(&new.content_id)
        .bind(new.content_type)
        .bind(&new.creator_id)
        .bind(&new.gateway_transaction_id)
        .bind(new.amount_cents)
        .bind(&new.currency)
        .bind(new.creator_share_cents)
        .bind(new.platform_share_cents)
        .bind(status)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(Self::map_insert_error)?;

        Ok(PurchaseRecord {
            id,
            buyer_id: new.buyer_id,
            content_id: new.content_id,
            content_type: new.content_type,
            creator_id: new.creator_id,
            gateway_transaction_id: new.gateway_transaction_id,
            amount_cents: new.amount_cents,
            currency: new.currency,
            creator_share_cents: new.creator_share_cents,
            platform_share_cents: new.platform_share_cents,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    fn map_insert_error(e: sqlx::Error) -> CommerceError {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return CommerceError::DuplicatePurchase;
            }
            if db_err.is_check_violation() {
                return CommerceError::InvariantViolation(
                    "Rejected by amount split check constraint".to_string(),
                );
            }
        }
        CommerceError::Database(e)
    }

    /// Look up a record by its gateway transaction id
    pub async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> CommerceResult<Option<PurchaseRecord>> {
        let record = sqlx::query_as::<_, PurchaseRecord>(
            "SELECT * FROM purchase_record WHERE gateway_transaction_id = ?",
        )
        .bind(transaction_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    /// Find the completed purchase for a buyer and content item
    pub async fn find_completed(
        &self,
        buyer_id: &str,
        content_id: &str,
        content_type: ContentType,
    ) -> CommerceResult<Option<PurchaseRecord>> {
        let record = sqlx::query_as::<_, PurchaseRecord>(
            r#"
            SELECT * FROM purchase_record
            WHERE buyer_id = ? AND content_id = ? AND content_type = ? AND status = 'completed'
            "#,
        )
        .bind(buyer_id)
        .bind(content_id)
        .bind(content_type)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    /// Whether the buyer holds any active (pending or completed) purchase
    pub async fn has_active_purchase(
        &self,
        buyer_id: &str,
        content_id: &str,
        content_type: ContentType,
    ) -> CommerceResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM purchase_record
            WHERE buyer_id = ? AND content_id = ? AND content_type = ?
              AND status IN ('pending', 'completed')
            "#,
        )
        .bind(buyer_id)
        .bind(content_id)
        .bind(content_type)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.is_some())
    }

    /// Whether the buyer holds a completed purchase for the content item
    pub async fn has_completed_purchase(
        &self,
        buyer_id: &str,
        content_id: &str,
    ) -> CommerceResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM purchase_record
            WHERE buyer_id = ? AND content_id = ? AND status = 'completed'
            "#,
        )
        .bind(buyer_id)
        .bind(content_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.is_some())
    }

    /// Apply a status transition, conditioned on the current status
    ///
    /// Returns whether a row changed. Redelivered events and raced
    /// transitions fall through to `false` instead of double-applying.
    pub async fn transition(
        &self,
        transaction_id: &str,
        from: PurchaseStatus,
        to: PurchaseStatus,
    ) -> CommerceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_record
            SET status = ?, updated_at = ?
            WHERE gateway_transaction_id = ? AND status = ?
            "#,
        )
        .bind(to)
        .bind(Utc::now())
        .bind(transaction_id)
        .bind(from)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Add the buyer to the content item's access set (idempotent)
    pub async fn grant_content_access(
        &self,
        content_id: &str,
        content_type: ContentType,
        buyer_id: &str,
    ) -> CommerceResult<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO content_access (content_id, content_type, buyer_id, granted_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(content_id)
        .bind(content_type)
        .bind(buyer_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// List a buyer's active purchases, newest first
    pub async fn list_for_buyer(&self, buyer_id: &str) -> CommerceResult<Vec<PurchaseRecord>> {
        let records = sqlx::query_as::<_, PurchaseRecord>(
            r#"
            SELECT * FROM purchase_record
            WHERE buyer_id = ? AND status IN ('pending', 'completed')
            ORDER BY created_at DESC
            "#,
        )
        .bind(buyer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }
}
