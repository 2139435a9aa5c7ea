/// Buyer and creator directory lookups
///
/// Accounts are provisioned by the platform's auth service; this side only
/// resolves them. Payout destinations are configured through the creator
/// onboarding flow, which may not have happened yet.
use crate::{
    db::models::Buyer,
    error::{CommerceError, CommerceResult},
};
use sqlx::{Row, SqlitePool};

/// Read-only directory of buyers and creator payout destinations
#[derive(Clone)]
pub struct Directory {
    db: SqlitePool,
}

impl Directory {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Resolve a buyer by email (case-insensitive)
    pub async fn buyer_by_email(&self, email: &str) -> CommerceResult<Option<Buyer>> {
        let buyer = sqlx::query_as::<_, Buyer>(
            "SELECT id, email, display_name, created_at FROM buyer WHERE email = ? COLLATE NOCASE",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(buyer)
    }

    /// Resolve a buyer by id
    pub async fn buyer_by_id(&self, buyer_id: &str) -> CommerceResult<Option<Buyer>> {
        let buyer = sqlx::query_as::<_, Buyer>(
            "SELECT id, email, display_name, created_at FROM buyer WHERE id = ?",
        )
        .bind(buyer_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(buyer)
    }

    /// Resolve a creator's payout destination
    ///
    /// Returns the destination account when configured, otherwise an error
    /// the checkout path surfaces directly.
    pub async fn payout_destination(&self, creator_id: &str) -> CommerceResult<String> {
        let row = sqlx::query(
            "SELECT payout_account_id FROM creator_profile WHERE creator_id = ?",
        )
        .bind(creator_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let destination: Option<String> = row.get("payout_account_id");
                destination.ok_or(CommerceError::CreatorPayoutNotConfigured)
            }
            None => Err(CommerceError::CreatorPayoutNotConfigured),
        }
    }
}
