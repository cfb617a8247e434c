//! # Access-Token Codec
//!
//! Mints short-lived bearer tokens (JWT, HS256) carrying the caller's
//! identity, tenant, and active role.
//!
//! ## Token Contents
//!
//! | Claim | Description | Example |
//! |-------|-------------|---------|
//! | `sub` | Subject (user ID) | `550e8400-e29b-...` |
//! | `tenant_id` | Tenant binding (absent pre-tenant) | `9b2e...` |
//! | `email` | User's email | `user@example.com` |
//! | `role` | Active role | `student` |
//! | `iss` | Issuer | `atheneum` |
//! | `aud` | Audience | `atheneum-api` |
//! | `exp` | Expiration time | Unix timestamp |
//! | `iat` | Issued at | Unix timestamp |
//! | `jti` | JWT ID (unique) | UUID |
//!
//! The claims carry enough for downstream services to authorize without a
//! database hit, and never carry credential material (no password hash, no
//! verification or reset tokens).
//!
//! ## Security Notes
//!
//! - **HS256** (HMAC-SHA256) signing; secret must be at least 32 characters
//! - Tokens are stateless: the store does not track them, expiry is the only
//!   invalidation
//! - Validated for signature, expiration, issuer, and audience

use crate::config::JwtConfig;
use crate::errors::AuthError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Claims Structures
// =============================================================================

/// The identity a service asks the codec to embed.
#[derive(Debug, Clone)]
pub struct AccessTokenClaims {
    /// The user's unique identifier
    pub user_id: Uuid,
    /// Tenant binding; `None` for pre-tenant accounts
    pub tenant_id: Option<Uuid>,
    /// User's email address
    pub email: String,
    /// The user's active role (serialized lowercase)
    pub role: String,
}

/// JWT claims as they appear on the wire.
///
/// All fields are verified during decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user's unique identifier (UUID)
    pub sub: Uuid,

    /// Tenant binding; omitted when the user is pre-tenant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,

    /// User's email address (for display and logging)
    pub email: String,

    /// Active role for authorization decisions
    pub role: String,

    /// Issuer - identifies who created the token
    pub iss: String,

    /// Audience - identifies who the token is intended for
    pub aud: String,

    /// Expiration time as Unix timestamp (seconds since epoch)
    pub exp: i64,

    /// Issued-at time as Unix timestamp
    pub iat: i64,

    /// Unique identifier for this specific token
    pub jti: Uuid,
}

// =============================================================================
// Issuer
// =============================================================================

/// Service for access-token minting and validation.
///
/// Create once at startup and share via `Arc`; the underlying keys are
/// immutable after construction.
#[derive(Clone)]
pub struct AccessTokenIssuer {
    /// Key for signing tokens (kept secret)
    encoding_key: EncodingKey,
    /// Key for verifying signatures
    decoding_key: DecodingKey,
    /// Issuer/audience configuration
    config: JwtConfig,
}

impl AccessTokenIssuer {
    /// Creates a new issuer from the given configuration.
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            encoding_key,
            decoding_key,
            config,
        }
    }

    /// Mints an access token for the given identity.
    ///
    /// ## Parameters
    ///
    /// - `input`: the identity to embed
    /// - `ttl_seconds`: lifetime; the `accessTokenExpiry` configuration value
    ///
    /// ## Errors
    ///
    /// Returns `AuthError::TokenGenerationFailed` if encoding fails, which
    /// should not happen with a valid secret.
    pub fn mint(&self, input: AccessTokenClaims, ttl_seconds: u64) -> Result<String, AuthError> {
        let now = Utc::now();

        let claims = Claims {
            sub: input.user_id,
            tenant_id: input.tenant_id,
            email: input.email,
            role: input.role,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: (now + Duration::seconds(ttl_seconds as i64)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(), // Unique ID for this token
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "Failed to encode access token");
            AuthError::TokenGenerationFailed
        })
    }

    /// Validates and decodes an access token.
    ///
    /// ## Validation Steps
    ///
    /// 1. Verify signature (proves the token wasn't tampered with)
    /// 2. Check expiration
    /// 3. Verify issuer and audience
    ///
    /// ## Errors
    ///
    /// - `AuthError::TokenExpired` - the token has expired
    /// - `AuthError::InvalidToken` - bad signature, issuer, or audience
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let token_data: TokenData<Claims> =
            decode(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }

    /// Extracts the token from an Authorization header.
    ///
    /// Expects the format: `Bearer <token>`
    pub fn extract_from_header(auth_header: &str) -> Result<&str, AuthError> {
        auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)
    }
}

// Implement Debug manually to avoid exposing keys
impl std::fmt::Debug for AccessTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenIssuer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test_secret_key_minimum_32_chars_required".to_string(),
            issuer: "test-issuer".to_string(),
            audience: "test-audience".to_string(),
        }
    }

    fn test_claims(tenant: Option<Uuid>) -> AccessTokenClaims {
        AccessTokenClaims {
            user_id: Uuid::new_v4(),
            tenant_id: tenant,
            email: "test@example.com".to_string(),
            role: "student".to_string(),
        }
    }

    #[test]
    fn mint_and_decode_round_trip() {
        let issuer = AccessTokenIssuer::new(test_config());
        let tenant = Uuid::new_v4();
        let input = test_claims(Some(tenant));
        let user_id = input.user_id;

        let token = issuer.mint(input, 900).unwrap();
        let claims = issuer.decode(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.tenant_id, Some(tenant));
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.role, "student");
        assert_eq!(claims.iss, "test-issuer");
    }

    #[test]
    fn pre_tenant_token_omits_tenant_claim() {
        let issuer = AccessTokenIssuer::new(test_config());

        let token = issuer.mint(test_claims(None), 900).unwrap();
        let claims = issuer.decode(&token).unwrap();

        assert_eq!(claims.tenant_id, None);
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let config = test_config();
        let issuer = AccessTokenIssuer::new(config.clone());

        // Hand-encode claims that expired well past the validation leeway
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            tenant_id: None,
            email: "test@example.com".to_string(),
            role: "student".to_string(),
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            exp: (now - Duration::seconds(300)).timestamp(),
            iat: (now - Duration::seconds(600)).timestamp(),
            jti: Uuid::new_v4(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(issuer.decode(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn tampered_token_is_invalid() {
        let issuer = AccessTokenIssuer::new(test_config());
        let mut token = issuer.mint(test_claims(None), 900).unwrap();
        token.push('x');

        assert!(matches!(issuer.decode(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn each_token_gets_a_unique_jti() {
        let issuer = AccessTokenIssuer::new(test_config());
        let input = test_claims(None);

        let t1 = issuer.mint(input.clone(), 900).unwrap();
        let t2 = issuer.mint(input, 900).unwrap();

        let c1 = issuer.decode(&t1).unwrap();
        let c2 = issuer.decode(&t2).unwrap();
        assert_ne!(c1.jti, c2.jti);
    }

    #[test]
    fn extract_from_header_requires_bearer_prefix() {
        let extracted = AccessTokenIssuer::extract_from_header("Bearer abc.def.ghi").unwrap();
        assert_eq!(extracted, "abc.def.ghi");

        assert!(matches!(
            AccessTokenIssuer::extract_from_header("Basic abc"),
            Err(AuthError::InvalidToken)
        ));
    }
}
