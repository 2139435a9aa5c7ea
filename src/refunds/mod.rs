/// Creator-initiated refunds
///
/// Every precondition is checked locally before the gateway is involved,
/// and the ledger transition happens only after the gateway confirms the
/// refund. A gateway failure therefore leaves the purchase untouched and
/// retryable.
use crate::{
    catalog::ContentCatalog,
    db::models::{ContentType, PurchaseRecord, PurchaseStatus},
    directory::Directory,
    error::{CommerceError, CommerceResult},
    gateway::PaymentGateway,
    ledger::PurchaseManager,
    mailer::Mailer,
    metrics,
};
use std::sync::Arc;

/// Refund request, as a creator files it
#[derive(Debug, Clone)]
pub struct RefundInput {
    pub buyer_email: String,
    pub content_type: ContentType,
    pub content_title: String,
}

/// Refund orchestrator
pub struct RefundManager {
    directory: Arc<Directory>,
    catalog: Arc<ContentCatalog>,
    purchases: Arc<PurchaseManager>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<Mailer>,
}

impl RefundManager {
    pub fn new(
        directory: Arc<Directory>,
        catalog: Arc<ContentCatalog>,
        purchases: Arc<PurchaseManager>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<Mailer>,
    ) -> Self {
        Self {
            directory,
            catalog,
            purchases,
            gateway,
            mailer,
        }
    }

    /// Refund a buyer's completed purchase of the creator's content
    pub async fn refund(
        &self,
        creator_id: &str,
        input: RefundInput,
    ) -> CommerceResult<PurchaseRecord> {
        let buyer = self
            .directory
            .buyer_by_email(&input.buyer_email)
            .await?
            .ok_or_else(|| CommerceError::BuyerNotFound(input.buyer_email.clone()))?;

        let content = self
            .catalog
            .content_by_title(&input.content_title, input.content_type)
            .await?
            .ok_or_else(|| {
                CommerceError::ContentNotFound(format!(
                    "{} \"{}\"",
                    input.content_type, input.content_title
                ))
            })?;

        let purchase = self
            .purchases
            .find_completed(&buyer.id, &content.id, content.content_type)
            .await?
            .ok_or(CommerceError::NoRefundablePurchase)?;

        if content.creator_id != creator_id {
            return Err(CommerceError::Unauthorized(
                "Only the content owner may issue a refund".to_string(),
            ));
        }

        if purchase.is_manual() {
            return Err(CommerceError::ManualPurchaseNotRefundable);
        }

        // Money moves first; the ledger follows the gateway's answer.
        let refund_id = self
            .gateway
            .create_refund(&purchase.gateway_transaction_id)
            .await?;

        let changed = self
            .purchases
            .transition(
                &purchase.gateway_transaction_id,
                PurchaseStatus::Completed,
                PurchaseStatus::Refunded,
            )
            .await?;

        if !changed {
            // A refunded event beat us to the transition; the row already
            // converged to the state we wanted.
            tracing::warn!(
                transaction_id = %purchase.gateway_transaction_id,
                refund_id = %refund_id,
                "Refund transition already applied"
            );
        } else {
            metrics::REFUNDS_TOTAL.inc();
        }

        tracing::info!(
            transaction_id = %purchase.gateway_transaction_id,
            refund_id = %refund_id,
            buyer_id = %buyer.id,
            creator_id,
            "Refund issued"
        );

        if let Err(e) = self
            .mailer
            .send_refund_notice(
                &buyer.email,
                &content.title,
                purchase.amount_cents,
                &purchase.currency,
            )
            .await
        {
            tracing::warn!("Failed to send refund notice: {}", e);
        }

        self.purchases
            .find_by_transaction(&purchase.gateway_transaction_id)
            .await?
            .ok_or_else(|| CommerceError::Internal("Refunded purchase row vanished".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ContentItem;
    use crate::gateway::{CreateTransactionRequest, TransactionHandle};
    use crate::ledger::NewPurchase;
    use async_trait::async_trait;
    use chrono::Utc;
    use sqlx::SqlitePool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGateway {
        refunds: AtomicUsize,
        fail: bool,
    }

    impl StubGateway {
        fn new(fail: bool) -> Self {
            Self {
                refunds: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_transaction(
            &self,
            _request: CreateTransactionRequest,
        ) -> CommerceResult<TransactionHandle> {
            unreachable!("refund tests never open transactions")
        }

        async fn create_refund(&self, _transaction_id: &str) -> CommerceResult<String> {
            if self.fail {
                return Err(CommerceError::GatewayUnavailable("request timed out".to_string()));
            }
            self.refunds.fetch_add(1, Ordering::SeqCst);
            Ok("re_1".to_string())
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn seed(pool: &SqlitePool) {
        sqlx::query("INSERT INTO buyer (id, email, display_name, created_at) VALUES ('b1', 'traveler@example.com', 'Sam', ?)")
            .bind(Utc::now())
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO content_item (id, content_type, title, price_cents, currency, creator_id, avg_rating, rating_count, created_at)
             VALUES ('trip-1', 'trip', 'Kyoto in Five Days', 4999, 'USD', 'creator-1', 0, 0, ?)",
        )
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    async fn completed_purchase(pool: &SqlitePool, tx: &str) {
        let purchases = PurchaseManager::new(pool.clone());
        purchases
            .create_pending(NewPurchase {
                buyer_id: "b1".to_string(),
                content_id: "trip-1".to_string(),
                content_type: ContentType::Trip,
                creator_id: "creator-1".to_string(),
                gateway_transaction_id: tx.to_string(),
                amount_cents: 4999,
                currency: "USD".to_string(),
                creator_share_cents: 3999,
                platform_share_cents: 1000,
            })
            .await
            .unwrap();
        purchases
            .transition(tx, PurchaseStatus::Pending, PurchaseStatus::Completed)
            .await
            .unwrap();
    }

    fn manager(pool: &SqlitePool, gateway: Arc<StubGateway>) -> RefundManager {
        RefundManager::new(
            Arc::new(Directory::new(pool.clone())),
            Arc::new(ContentCatalog::new(pool.clone())),
            Arc::new(PurchaseManager::new(pool.clone())),
            gateway,
            Arc::new(Mailer::new(None).unwrap()),
        )
    }

    fn input() -> RefundInput {
        RefundInput {
            buyer_email: "traveler@example.com".to_string(),
            content_type: ContentType::Trip,
            content_title: "Kyoto in Five Days".to_string(),
        }
    }

    #[tokio::test]
    async fn refund_transitions_ledger_after_gateway_confirms() {
        let pool = test_pool().await;
        seed(&pool).await;
        completed_purchase(&pool, "tx_1").await;

        let gateway = Arc::new(StubGateway::new(false));
        let refunds = manager(&pool, gateway.clone());

        let record = refunds.refund("creator-1", input()).await.unwrap();
        assert_eq!(record.status, PurchaseStatus::Refunded);
        assert_eq!(gateway.refunds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_buyer_fails_first() {
        let pool = test_pool().await;
        seed(&pool).await;

        let refunds = manager(&pool, Arc::new(StubGateway::new(false)));
        let mut bad = input();
        bad.buyer_email = "stranger@example.com".to_string();

        let err = refunds.refund("creator-1", bad).await.unwrap_err();
        assert!(matches!(err, CommerceError::BuyerNotFound(_)));
    }

    #[tokio::test]
    async fn missing_purchase_is_not_refundable() {
        let pool = test_pool().await;
        seed(&pool).await;

        let refunds = manager(&pool, Arc::new(StubGateway::new(false)));
        let err = refunds.refund("creator-1", input()).await.unwrap_err();
        assert!(matches!(err, CommerceError::NoRefundablePurchase));
    }

    #[tokio::test]
    async fn wrong_creator_is_rejected() {
        let pool = test_pool().await;
        seed(&pool).await;
        completed_purchase(&pool, "tx_1").await;

        let gateway = Arc::new(StubGateway::new(false));
        let refunds = manager(&pool, gateway.clone());

        let err = refunds.refund("creator-2", input()).await.unwrap_err();
        assert!(matches!(err, CommerceError::Unauthorized(_)));
        assert_eq!(gateway.refunds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn manual_purchase_is_never_refundable() {
        let pool = test_pool().await;
        seed(&pool).await;

        let purchases = PurchaseManager::new(pool.clone());
        let content = ContentItem {
            id: "trip-1".to_string(),
            content_type: ContentType::Trip,
            title: "Kyoto in Five Days".to_string(),
            price_cents: 4999,
            currency: "USD".to_string(),
            creator_id: "creator-1".to_string(),
            avg_rating: 0.0,
            rating_count: 0,
            created_at: Utc::now(),
        };
        purchases
            .create_manual("b1", &content, 3999, 1000)
            .await
            .unwrap();

        let gateway = Arc::new(StubGateway::new(false));
        let refunds = manager(&pool, gateway.clone());

        // All other preconditions hold, yet the manual grant must win
        let err = refunds.refund("creator-1", input()).await.unwrap_err();
        assert!(matches!(err, CommerceError::ManualPurchaseNotRefundable));
        assert_eq!(gateway.refunds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gateway_failure_leaves_purchase_completed() {
        let pool = test_pool().await;
        seed(&pool).await;
        completed_purchase(&pool, "tx_1").await;

        let refunds = manager(&pool, Arc::new(StubGateway::new(true)));
        let err = refunds.refund("creator-1", input()).await.unwrap_err();
        assert!(matches!(err, CommerceError::GatewayUnavailable(_)));

        let record = PurchaseManager::new(pool)
            .find_by_transaction("tx_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, PurchaseStatus::Completed);
    }
}
