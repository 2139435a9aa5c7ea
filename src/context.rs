/// Application context and dependency injection
use crate::{
    catalog::ContentCatalog,
    checkout::CheckoutManager,
    config::ServerConfig,
    db,
    directory::Directory,
    entitlement::{AccessKeyManager, EntitlementResolver},
    error::{CommerceError, CommerceResult},
    gateway::{HttpPaymentGateway, PaymentGateway},
    ledger::PurchaseManager,
    mailer::Mailer,
    refunds::RefundManager,
    reviews::ReviewManager,
    webhooks::WebhookProcessor,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub catalog: Arc<ContentCatalog>,
    pub directory: Arc<Directory>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub purchases: Arc<PurchaseManager>,
    pub entitlements: Arc<EntitlementResolver>,
    pub checkout: Arc<CheckoutManager>,
    pub webhooks: Arc<WebhookProcessor>,
    pub refunds: Arc<RefundManager>,
    pub access_keys: Arc<AccessKeyManager>,
    pub reviews: Arc<ReviewManager>,
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> CommerceResult<Self> {
        let gateway = Arc::new(HttpPaymentGateway::new(&config.gateway)?);
        Self::with_gateway(config, gateway).await
    }

    /// Create a context with a caller-provided gateway client
    pub async fn with_gateway(
        config: ServerConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> CommerceResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        // Initialize ledger database
        let ledger_db =
            db::create_pool(&config.storage.ledger_db, db::DatabaseOptions::default()).await?;

        // Run migrations and verify the connection
        db::run_migrations(&ledger_db).await?;
        db::test_connection(&ledger_db).await?;

        // Leaf services first
        let catalog = Arc::new(ContentCatalog::new(ledger_db.clone()));
        let directory = Arc::new(Directory::new(ledger_db.clone()));
        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        let purchases = Arc::new(PurchaseManager::new(ledger_db.clone()));
        let entitlements = Arc::new(EntitlementResolver::new(Arc::clone(&purchases)));

        // Orchestrating services on top
        let checkout = Arc::new(CheckoutManager::new(
            Arc::clone(&catalog),
            Arc::clone(&directory),
            Arc::clone(&purchases),
            Arc::clone(&gateway),
            config.gateway.platform_fee_percent,
        ));
        let webhooks = Arc::new(WebhookProcessor::new(
            Arc::clone(&purchases),
            config.gateway.webhook_secret.clone(),
            config.gateway.webhook_tolerance_secs,
            config.gateway.platform_fee_percent,
        ));
        let refunds = Arc::new(RefundManager::new(
            Arc::clone(&directory),
            Arc::clone(&catalog),
            Arc::clone(&purchases),
            Arc::clone(&gateway),
            Arc::clone(&mailer),
        ));
        let access_keys = Arc::new(AccessKeyManager::new(
            ledger_db.clone(),
            Arc::clone(&mailer),
        ));
        let reviews = Arc::new(ReviewManager::new(
            ledger_db.clone(),
            Arc::clone(&entitlements),
        ));

        Ok(Self {
            config: Arc::new(config),
            db: ledger_db,
            catalog,
            directory,
            gateway,
            purchases,
            entitlements,
            checkout,
            webhooks,
            refunds,
            access_keys,
            reviews,
            mailer,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> CommerceResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                CommerceError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
