/// Authentication extractor
///
/// Sessions are issued by the platform's auth service; this service only
/// verifies the HS256 tokens it is handed and never mints them.
use crate::{api::middleware::extract_bearer_token, context::AppContext, error::CommerceError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

/// Claims carried by a platform session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Platform user id
    pub sub: String,
    pub email: Option<String>,
    pub exp: i64,
}

/// Authenticated context - extracts and validates the session token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = CommerceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| CommerceError::Authentication("Missing authorization header".to_string()))?;

        let claims = verify_session_token(&token, &state.config.authentication.jwt_secret)?;

        Ok(AuthContext {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}

/// Verify a session token
///
/// Checks the signature, expiry (with clock-skew leeway), and claim shape.
pub fn verify_session_token(token: &str, jwt_secret: &str) -> Result<SessionClaims, CommerceError> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (5 minutes)
    validation.leeway = 300;

    let data = decode::<SessionClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::warn!("Session token verification failed: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                CommerceError::Authentication("Token has expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                CommerceError::Authentication("Invalid token signature".to_string())
            }
            _ => CommerceError::Authentication(format!("Invalid token: {}", e)),
        }
    })?;

    Ok(data.claims)
}
