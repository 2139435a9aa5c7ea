/// Email-bound access keys
///
/// A purchase made without an authenticated session is redeemable through
/// a mailed key, so the buyer can unlock the content on any device. Keys
/// are time-boxed; expiry is evaluated at verification time, never by a
/// background sweep.
use crate::{
    db::models::{AccessGrant, ContentItem, ContentType},
    error::{CommerceError, CommerceResult},
    mailer::Mailer,
    metrics,
};
use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Unformatted key length
pub const ACCESS_KEY_LEN: usize = 16;

/// Grants are valid for one year unless issued without an expiry
const DEFAULT_VALIDITY_DAYS: i64 = 365;

/// Attempts before giving up on key allocation
const MAX_KEY_ATTEMPTS: usize = 5;

const KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a raw 16-character key
pub fn generate_key() -> String {
    let mut rng = rand::thread_rng();
    (0..ACCESS_KEY_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..KEY_CHARSET.len());
            KEY_CHARSET[idx] as char
        })
        .collect()
}

/// Render a key in dash-separated 4-character groups for transcription
pub fn format_key(key: &str) -> String {
    key.as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).to_string())
        .collect::<Vec<_>>()
        .join("-")
}

/// Strip separators and uppercase, the inverse of `format_key`
pub fn normalize_key(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Access key grant and verification service
#[derive(Clone)]
pub struct AccessKeyManager {
    db: SqlitePool,
    mailer: Arc<Mailer>,
}

impl AccessKeyManager {
    pub fn new(db: SqlitePool, mailer: Arc<Mailer>) -> Self {
        Self { db, mailer }
    }

    /// Issue a new grant for a content item and mail the key
    ///
    /// Email dispatch is fire-and-forget: a delivery failure is logged but
    /// never rolls back the grant.
    pub async fn grant(&self, content: &ContentItem, email: &str) -> CommerceResult<AccessGrant> {
        let email = email.trim().to_lowercase();
        let now = Utc::now();
        let expires_at = now + Duration::days(DEFAULT_VALIDITY_DAYS);

        let mut stored_key = None;
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = generate_key();
            let result = sqlx::query(
                r#"
                INSERT INTO access_grant
                    (access_key, content_id, content_type, email, created_at, expires_at, is_active, last_accessed_at)
                VALUES (?, ?, ?, ?, ?, ?, 1, NULL)
                ON CONFLICT (access_key) DO NOTHING
                "#,
            )
            .bind(&key)
            .bind(&content.id)
            .bind(content.content_type)
            .bind(&email)
            .bind(now)
            .bind(expires_at)
            .execute(&self.db)
            .await?;

            if result.rows_affected() == 1 {
                stored_key = Some(key);
                break;
            }
            tracing::warn!("Access key collision, regenerating");
        }

        let key = stored_key.ok_or(CommerceError::AccessKeyCollision)?;

        let grant = AccessGrant {
            access_key: key.clone(),
            content_id: content.id.clone(),
            content_type: content.content_type,
            email: email.clone(),
            created_at: now,
            expires_at: Some(expires_at),
            is_active: true,
            last_accessed_at: None,
        };

        tracing::info!(content_id = %content.id, email = %email, "Access grant issued");

        if let Err(e) = self
            .mailer
            .send_access_key_email(&email, &content.title, &format_key(&key), expires_at)
            .await
        {
            tracing::warn!("Failed to send access key email: {}", e);
        }

        Ok(grant)
    }

    /// Redeem a key against an email and content item
    ///
    /// All failure causes collapse to one error at the boundary so the
    /// endpoint cannot be used to probe which keys exist.
    pub async fn verify(
        &self,
        email: &str,
        key_input: &str,
        content_id: &str,
    ) -> CommerceResult<AccessGrant> {
        let key = normalize_key(key_input);
        if key.len() != ACCESS_KEY_LEN {
            return Err(CommerceError::Validation("Malformed access key".to_string()));
        }

        let grant = sqlx::query_as::<_, AccessGrant>(
            "SELECT * FROM access_grant WHERE access_key = ?",
        )
        .bind(&key)
        .fetch_optional(&self.db)
        .await?;

        let Some(grant) = grant else {
            metrics::record_access_key_verification(false);
            tracing::debug!("Access key not found");
            return Err(CommerceError::AccessKeyInvalid);
        };

        if !grant.email.eq_ignore_ascii_case(email.trim()) {
            metrics::record_access_key_verification(false);
            tracing::debug!("Access key email mismatch");
            return Err(CommerceError::AccessKeyInvalid);
        }

        if grant.content_id != content_id {
            metrics::record_access_key_verification(false);
            tracing::debug!("Access key content mismatch");
            return Err(CommerceError::AccessKeyInvalid);
        }

        if !grant.is_active {
            metrics::record_access_key_verification(false);
            tracing::debug!("Access key deactivated");
            return Err(CommerceError::AccessKeyInvalid);
        }

        if let Some(expires_at) = grant.expires_at {
            if expires_at < Utc::now() {
                metrics::record_access_key_verification(false);
                tracing::debug!("Access key expired at {}", expires_at);
                return Err(CommerceError::AccessKeyInvalid);
            }
        }

        let now = Utc::now();
        sqlx::query("UPDATE access_grant SET last_accessed_at = ? WHERE access_key = ?")
            .bind(now)
            .bind(&key)
            .execute(&self.db)
            .await?;

        metrics::record_access_key_verification(true);

        Ok(AccessGrant {
            last_accessed_at: Some(now),
            ..grant
        })
    }

    /// Explicitly revoke a grant
    pub async fn deactivate(&self, key_input: &str) -> CommerceResult<()> {
        let key = normalize_key(key_input);

        let result = sqlx::query("UPDATE access_grant SET is_active = 0 WHERE access_key = ?")
            .bind(&key)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CommerceError::AccessKeyInvalid);
        }

        Ok(())
    }

    /// Fetch a grant by key, for authorization checks
    pub async fn get(&self, key_input: &str) -> CommerceResult<Option<AccessGrant>> {
        let key = normalize_key(key_input);

        let grant = sqlx::query_as::<_, AccessGrant>(
            "SELECT * FROM access_grant WHERE access_key = ?",
        )
        .bind(&key)
        .fetch_optional(&self.db)
        .await?;

        Ok(grant)
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

    fn content() -> ContentItem {
        ContentItem {
            id: "trip-1".to_string(),
            content_type: ContentType::Trip,
            title: "Kyoto in Five Days".to_string(),
            price_cents: 4999,
            currency: "USD".to_string(),
            creator_id: "creator-1".to_string(),
            avg_rating: 0.0,
            rating_count: 0,
            created_at: Utc::now(),
        }
    }

    fn manager(pool: &SqlitePool) -> AccessKeyManager {
        AccessKeyManager::new(pool.clone(), Arc::new(Mailer::new(None).unwrap()))
    }

    #[test]
    fn key_format_round_trips() {
        let key = generate_key();
        assert_eq!(key.len(), ACCESS_KEY_LEN);

        let formatted = format_key(&key);
        assert_eq!(formatted.len(), ACCESS_KEY_LEN + 3);
        assert_eq!(formatted.matches('-').count(), 3);
        assert_eq!(normalize_key(&formatted), key);
        assert_eq!(normalize_key(&formatted.to_lowercase()), key);
    }

    #[tokio::test]
    async fn grant_and_verify() {
        let pool = test_pool().await;
        let keys = manager(&pool);

        let grant = keys.grant(&content(), "Traveler@Example.com").await.unwrap();
        assert_eq!(grant.email, "traveler@example.com");

        let verified = keys
            .verify("traveler@example.com", &format_key(&grant.access_key), "trip-1")
            .await
            .unwrap();
        assert!(verified.last_accessed_at.is_some());
    }

    #[tokio::test]
    async fn wrong_email_or_content_fails() {
        let pool = test_pool().await;
        let keys = manager(&pool);
        let grant = keys.grant(&content(), "traveler@example.com").await.unwrap();

        assert!(matches!(
            keys.verify("other@example.com", &grant.access_key, "trip-1").await,
            Err(CommerceError::AccessKeyInvalid)
        ));
        assert!(matches!(
            keys.verify("traveler@example.com", &grant.access_key, "trip-2").await,
            Err(CommerceError::AccessKeyInvalid)
        ));
    }

    #[tokio::test]
    async fn expired_grant_fails_verification() {
        let pool = test_pool().await;
        let keys = manager(&pool);

        sqlx::query(
            "INSERT INTO access_grant (access_key, content_id, content_type, email, created_at, expires_at, is_active, last_accessed_at)
             VALUES ('AAAABBBBCCCCDDDD', 'trip-1', 'trip', 'traveler@example.com', ?, ?, 1, NULL)",
        )
        .bind(Utc::now() - Duration::days(400))
        .bind(Utc::now() - Duration::days(35))
        .execute(&pool)
        .await
        .unwrap();

        assert!(matches!(
            keys.verify("traveler@example.com", "AAAA-BBBB-CCCC-DDDD", "trip-1").await,
            Err(CommerceError::AccessKeyInvalid)
        ));
    }

    #[tokio::test]
    async fn grant_without_expiry_never_expires() {
        let pool = test_pool().await;
        let keys = manager(&pool);

        sqlx::query(
            "INSERT INTO access_grant (access_key, content_id, content_type, email, created_at, expires_at, is_active, last_accessed_at)
             VALUES ('AAAABBBBCCCCDDDD', 'trip-1', 'trip', 'traveler@example.com', ?, NULL, 1, NULL)",
        )
        .bind(Utc::now() - Duration::days(4000))
        .execute(&pool)
        .await
        .unwrap();

        assert!(keys
            .verify("traveler@example.com", "AAAABBBBCCCCDDDD", "trip-1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn deactivated_grant_fails_verification() {
        let pool = test_pool().await;
        let keys = manager(&pool);
        let grant = keys.grant(&content(), "traveler@example.com").await.unwrap();

        keys.deactivate(&grant.access_key).await.unwrap();

        assert!(matches!(
            keys.verify("traveler@example.com", &grant.access_key, "trip-1").await,
            Err(CommerceError::AccessKeyInvalid)
        ));
    }

    #[tokio::test]
    async fn malformed_key_is_invalid_input() {
        let pool = test_pool().await;
        let keys = manager(&pool);

        assert!(matches!(
            keys.verify("traveler@example.com", "short", "trip-1").await,
            Err(CommerceError::Validation(_))
        ));
    }
}
