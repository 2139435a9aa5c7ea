/// Configuration management for the Wayfare ledger service
use crate::error::{CommerceError, CommerceResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub ledger_db: PathBuf,
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub webhook_secret: String,
    /// Timeout for synchronous gateway calls, in seconds
    pub request_timeout_secs: u64,
    /// Maximum accepted age of a signed webhook timestamp, in seconds
    pub webhook_tolerance_secs: i64,
    /// Platform share of each sale, in whole percent
    pub platform_fee_percent: i64,
}

/// Authentication configuration
///
/// Sessions are issued by the platform's auth service; this service only
/// verifies the tokens it is handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> CommerceResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("WAYFARE_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("WAYFARE_PORT")
            .unwrap_or_else(|_| "2920".to_string())
            .parse()
            .map_err(|_| CommerceError::Validation("Invalid port number".to_string()))?;
        let version = env::var("WAYFARE_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("WAYFARE_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let ledger_db = env::var("WAYFARE_LEDGER_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("ledger.sqlite"));

        let gateway_base_url = env::var("WAYFARE_GATEWAY_BASE_URL")
            .map_err(|_| CommerceError::Validation("Gateway base URL required".to_string()))?;
        let gateway_api_key = env::var("WAYFARE_GATEWAY_API_KEY")
            .map_err(|_| CommerceError::Validation("Gateway API key required".to_string()))?;
        let webhook_secret = env::var("WAYFARE_GATEWAY_WEBHOOK_SECRET")
            .map_err(|_| CommerceError::Validation("Gateway webhook secret required".to_string()))?;
        let request_timeout_secs = env::var("WAYFARE_GATEWAY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let webhook_tolerance_secs = env::var("WAYFARE_GATEWAY_WEBHOOK_TOLERANCE_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);
        let platform_fee_percent = env::var("WAYFARE_PLATFORM_FEE_PERCENT")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);

        let jwt_secret = env::var("WAYFARE_JWT_SECRET")
            .map_err(|_| CommerceError::Validation("JWT secret required".to_string()))?;

        let email = if let Ok(smtp_url) = env::var("WAYFARE_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("WAYFARE_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                ledger_db,
            },
            gateway: GatewayConfig {
                base_url: gateway_base_url,
                api_key: gateway_api_key,
                webhook_secret,
                request_timeout_secs,
                webhook_tolerance_secs,
                platform_fee_percent,
            },
            authentication: AuthConfig { jwt_secret },
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> CommerceResult<()> {
        if self.gateway.base_url.is_empty() {
            return Err(CommerceError::Validation(
                "Gateway base URL must not be empty".to_string(),
            ));
        }

        if !(0..=100).contains(&self.gateway.platform_fee_percent) {
            return Err(CommerceError::Validation(format!(
                "Platform fee percent must be between 0 and 100, got {}",
                self.gateway.platform_fee_percent
            )));
        }

        if self.gateway.request_timeout_secs == 0 {
            return Err(CommerceError::Validation(
                "Gateway timeout must be at least 1 second".to_string(),
            ));
        }

        if self.authentication.jwt_secret.len() < 16 {
            return Err(CommerceError::Validation(
                "JWT secret must be at least 16 characters".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 2920,
                version: "0.1.0".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                ledger_db: "./data/ledger.sqlite".into(),
            },
            gateway: GatewayConfig {
                base_url: "https://gateway.test".to_string(),
                api_key: "sk_test".to_string(),
                webhook_secret: "whsec_test".to_string(),
                request_timeout_secs: 10,
                webhook_tolerance_secs: 300,
                platform_fee_percent: 20,
            },
            authentication: AuthConfig {
                jwt_secret: "0123456789abcdef".to_string(),
            },
            email: None,
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn fee_percent_out_of_range_is_rejected() {
        let mut config = test_config();
        config.gateway.platform_fee_percent = 120;
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut config = test_config();
        config.authentication.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }
}
