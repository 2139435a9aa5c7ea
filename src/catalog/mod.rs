/// Content catalog lookups
///
/// The catalog is owned by the authoring side of the platform; the ledger
/// only reads from it. Rating fields on content rows are mutated by the
/// review manager, nowhere else.
use crate::{
    db::models::{ContentItem, ContentType},
    error::{CommerceError, CommerceResult},
};
use sqlx::SqlitePool;

/// Read-only catalog of purchasable content
#[derive(Clone)]
pub struct ContentCatalog {
    db: SqlitePool,
}

impl ContentCatalog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Look up a content item by id and type
    pub async fn get_content(
        &self,
        content_id: &str,
        content_type: ContentType,
    ) -> CommerceResult<ContentItem> {
        let item = sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT id, content_type, title, price_cents, currency, creator_id,
                   avg_rating, rating_count, created_at
            FROM content_item
            WHERE id = ? AND content_type = ?
            "#,
        )
        .bind(content_id)
        .bind(content_type)
        .fetch_optional(&self.db)
        .await?;

        item.ok_or_else(|| {
            CommerceError::ContentNotFound(format!("{} {}", content_type, content_id))
        })
    }

    /// Look up a content item by title and type
    pub async fn content_by_title(
        &self,
        title: &str,
        content_type: ContentType,
    ) -> CommerceResult<Option<ContentItem>> {
        let item = sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT id, content_type, title, price_cents, currency, creator_id,
                   avg_rating, rating_count, created_at
            FROM content_item
            WHERE title = ? AND content_type = ?
            "#,
        )
        .bind(title)
        .bind(content_type)
        .fetch_optional(&self.db)
        .await?;

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn insert_content(pool: &SqlitePool, id: &str, title: &str, price_cents: i64) {
        sqlx::query(
            "INSERT INTO content_item (id, content_type, title, price_cents, currency, creator_id, avg_rating, rating_count, created_at)
             VALUES (?, 'trip', ?, ?, 'USD', 'creator-1', 0, 0, ?)",
        )
        .bind(id)
        .bind(title)
        .bind(price_cents)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn lookup_by_id_and_title() {
        let pool = test_pool().await;
        insert_content(&pool, "trip-1", "Kyoto in Five Days", 4999).await;

        let catalog = ContentCatalog::new(pool);

        let item = catalog.get_content("trip-1", ContentType::Trip).await.unwrap();
        assert_eq!(item.price_cents, 4999);
        assert_eq!(item.creator_id, "creator-1");

        let by_title = catalog
            .content_by_title("Kyoto in Five Days", ContentType::Trip)
            .await
            .unwrap();
        assert_eq!(by_title.unwrap().id, "trip-1");

        // Same id under the other type does not resolve
        let missing = catalog.get_content("trip-1", ContentType::Goto).await;
        assert!(matches!(missing, Err(CommerceError::ContentNotFound(_))));
    }
}
