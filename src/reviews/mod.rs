/// Reviews and rating aggregation
///
/// One review per completed purchase. The running average on the content
/// row is advanced with a single arithmetic UPDATE so concurrent reviews
/// can never interleave a read-recompute-write.
use crate::{
    db::models::{ContentType, Review},
    entitlement::EntitlementResolver,
    error::{CommerceError, CommerceResult},
    metrics,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Allowed rating bounds, inclusive
pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Review submission service
pub struct ReviewManager {
    db: SqlitePool,
    entitlements: Arc<EntitlementResolver>,
}

impl ReviewManager {
    pub fn new(db: SqlitePool, entitlements: Arc<EntitlementResolver>) -> Self {
        Self { db, entitlements }
    }

    /// Attach a review to a purchased content item
    pub async fn submit(
        &self,
        author_id: &str,
        content_id: &str,
        content_type: ContentType,
        rating: i64,
        body: String,
    ) -> CommerceResult<Review> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(CommerceError::Validation(format!(
                "Rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }

        if !self.entitlements.has_access(author_id, content_id).await? {
            return Err(CommerceError::ReviewNotEligible);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let insert = sqlx::query(
            r#"
            INSERT INTO review (id, content_id, content_type, author_id, rating, body, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(content_id)
        .bind(content_type)
        .bind(author_id)
        .bind(rating)
        .bind(&body)
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return Err(CommerceError::DuplicateReview);
                }
            }
            return Err(CommerceError::Database(e));
        }

        // Online average update; never recomputed over all reviews.
        let updated = sqlx::query(
            r#"
            UPDATE content_item
            SET avg_rating = (avg_rating * rating_count + ?) / (rating_count + 1),
                rating_count = rating_count + 1
            WHERE id = ? AND content_type = ?
            "#,
        )
        .bind(rating)
        .bind(content_id)
        .bind(content_type)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(CommerceError::ContentNotFound(format!(
                "{} {}",
                content_type, content_id
            )));
        }

        tx.commit().await?;

        metrics::REVIEWS_TOTAL.inc();
        tracing::info!(content_id, author_id, rating, "Review recorded");

        Ok(Review {
            id,
            content_id: content_id.to_string(),
            content_type,
            author_id: author_id.to_string(),
            rating,
            body,
            created_at: now,
        })
    }

    /// List reviews for a content item, newest first
    pub async fn list_for_content(
        &self,
        content_id: &str,
        content_type: ContentType,
    ) -> CommerceResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT id, content_id, content_type, author_id, rating, body, created_at
            FROM review
            WHERE content_id = ? AND content_type = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(content_id)
        .bind(content_type)
        .fetch_all(&self.db)
        .await?;

        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PurchaseStatus;
    use crate::ledger::{NewPurchase, PurchaseManager};
    use sqlx::Row;

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn seed_content(pool: &SqlitePool, avg: f64, count: i64) {
        sqlx::query(
            "INSERT INTO content_item (id, content_type, title, price_cents, currency, creator_id, avg_rating, rating_count, created_at)
             VALUES ('trip-1', 'trip', 'Kyoto in Five Days', 4999, 'USD', 'creator-1', ?, ?, ?)",
        )
        .bind(avg)
        .bind(count)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    async fn completed_purchase(pool: &SqlitePool, buyer: &str, tx_id: &str) {
        let purchases = PurchaseManager::new(pool.clone());
        purchases
            .create_pending(NewPurchase {
                buyer_id: buyer.to_string(),
                content_id: "trip-1".to_string(),
                content_type: ContentType::Trip,
                creator_id: "creator-1".to_string(),
                gateway_transaction_id: tx_id.to_string(),
                amount_cents: 4999,
                currency: "USD".to_string(),
                creator_share_cents: 3999,
                platform_share_cents: 1000,
            })
            .await
            .unwrap();
        purchases
            .transition(tx_id, PurchaseStatus::Pending, PurchaseStatus::Completed)
            .await
            .unwrap();
    }

    fn manager(pool: &SqlitePool) -> ReviewManager {
        let purchases = Arc::new(PurchaseManager::new(pool.clone()));
        ReviewManager::new(pool.clone(), Arc::new(EntitlementResolver::new(purchases)))
    }

    async fn rating_state(pool: &SqlitePool) -> (f64, i64) {
        let row = sqlx::query("SELECT avg_rating, rating_count FROM content_item WHERE id = 'trip-1'")
            .fetch_one(pool)
            .await
            .unwrap();
        (row.get("avg_rating"), row.get("rating_count"))
    }

    #[tokio::test]
    async fn rating_advances_the_running_average() {
        let pool = test_pool().await;
        seed_content(&pool, 4.0, 1).await;
        completed_purchase(&pool, "b2", "tx_1").await;

        let reviews = manager(&pool);
        reviews
            .submit("b2", "trip-1", ContentType::Trip, 5, "Superb pacing".to_string())
            .await
            .unwrap();

        let (avg, count) = rating_state(&pool).await;
        assert!((avg - 4.5).abs() < f64::EPSILON);
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn first_review_sets_the_average() {
        let pool = test_pool().await;
        seed_content(&pool, 0.0, 0).await;
        completed_purchase(&pool, "b1", "tx_1").await;

        manager(&pool)
            .submit("b1", "trip-1", ContentType::Trip, 3, "Decent".to_string())
            .await
            .unwrap();

        let (avg, count) = rating_state(&pool).await;
        assert!((avg - 3.0).abs() < f64::EPSILON);
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn review_requires_completed_purchase() {
        let pool = test_pool().await;
        seed_content(&pool, 0.0, 0).await;

        let err = manager(&pool)
            .submit("b1", "trip-1", ContentType::Trip, 4, "Nice".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::ReviewNotEligible));

        let (_, count) = rating_state(&pool).await;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn second_review_by_same_author_is_rejected() {
        let pool = test_pool().await;
        seed_content(&pool, 0.0, 0).await;
        completed_purchase(&pool, "b1", "tx_1").await;

        let reviews = manager(&pool);
        reviews
            .submit("b1", "trip-1", ContentType::Trip, 4, "Nice".to_string())
            .await
            .unwrap();

        let err = reviews
            .submit("b1", "trip-1", ContentType::Trip, 5, "Even nicer".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::DuplicateReview));

        // The rejected insert must not have bumped the aggregate
        let (avg, count) = rating_state(&pool).await;
        assert!((avg - 4.0).abs() < f64::EPSILON);
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected() {
        let pool = test_pool().await;
        seed_content(&pool, 0.0, 0).await;
        completed_purchase(&pool, "b1", "tx_1").await;

        let reviews = manager(&pool);
        for rating in [0, 6, -1] {
            let err = reviews
                .submit("b1", "trip-1", ContentType::Trip, rating, "x".to_string())
                .await
                .unwrap_err();
            assert!(matches!(err, CommerceError::Validation(_)));
        }
    }
}
