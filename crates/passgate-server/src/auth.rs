//! Bearer token authentication with JWT.
//!
//! Every `/passport` route requires a token signed with the configured secret.
//! Requirement writes and manual refreshes additionally require the `admin`
//! claim.

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use passgate_domain::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication error
#[derive(Debug, Error)]
pub enum AuthError {
    /// JWT encoding failed
    #[error("Failed to encode JWT: {0}")]
    JwtEncode(#[from] jsonwebtoken::errors::Error),

    /// No bearer token on the request
    #[error("Missing bearer token")]
    MissingToken,

    /// Token expired
    #[error("Token expired")]
    TokenExpired,

    /// Invalid token
    #[error("Invalid token")]
    InvalidToken,

    /// Valid token without the admin claim
    #[error("Admin privileges required")]
    Forbidden,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (operator or host service name)
    pub sub: String,

    /// Whether the bearer may change requirements
    #[serde(default)]
    pub admin: bool,

    /// Token expiration timestamp (Unix epoch)
    pub exp: u64,

    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
}

/// Issues and verifies bearer tokens
pub struct AdminAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry_secs: u64,
}

impl AdminAuth {
    /// Create a new authenticator with the given JWT secret and expiry
    pub fn new(jwt_secret: &str, token_expiry_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_expiry_secs,
        }
    }

    /// Issue a token for `subject`
    pub fn issue_token(&self, subject: &str, admin: bool) -> Result<String, AuthError> {
        let now = SystemClock.now();

        let claims = Claims {
            sub: subject.to_string(),
            admin,
            exp: now + self.token_expiry_secs,
            iat: now,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }

    /// Authenticate a request from its `Authorization` header
    ///
    /// With `require_admin`, a valid token lacking the admin claim is
    /// rejected with [`AuthError::Forbidden`].
    pub fn authorize(&self, headers: &HeaderMap, require_admin: bool) -> Result<Claims, AuthError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.validate_token(token)?;
        if require_admin && !claims.admin {
            return Err(AuthError::Forbidden);
        }
        Ok(claims)
    }
}
