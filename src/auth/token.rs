use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::database::models::{Role, User};

/// What a token may be used for. A token is only honored for the purpose
/// it was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Refresh,
    PasswordReset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub purpose: TokenPurpose,
    pub exp: i64,
    pub iat: i64,
    pub jti: Uuid,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token purpose {actual:?} does not match expected {expected:?}")]
    WrongPurpose { expected: TokenPurpose, actual: TokenPurpose },

    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Copy)]
pub struct TokenRequest {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub purpose: TokenPurpose,
}

impl TokenRequest {
    pub fn for_user(user: &User, purpose: TokenPurpose) -> Self {
        Self {
            user_id: user.id,
            tenant_id: user.tenant_id,
            role: user.role,
            purpose,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// HS256 signer/verifier with the configured lifetimes per purpose
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    reset_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &SecurityConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            access_ttl: Duration::minutes(config.access_token_ttl_mins),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
            reset_ttl: Duration::minutes(config.reset_token_ttl_mins),
        }
    }

    pub fn sign(&self, request: TokenRequest, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: request.user_id,
            tenant_id: request.tenant_id,
            role: request.role,
            purpose: request.purpose,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str, expected: TokenPurpose) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(e.to_string()),
        })?;

        if data.claims.purpose != expected {
            return Err(TokenError::WrongPurpose {
                expected,
                actual: data.claims.purpose,
            });
        }
        Ok(data.claims)
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(TokenRequest::for_user(user, TokenPurpose::Access), self.access_ttl)?,
            refresh_token: self.sign(TokenRequest::for_user(user, TokenPurpose::Refresh), self.refresh_ttl)?,
            token_type: "Bearer",
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    pub fn issue_reset(&self, user: &User) -> Result<String, TokenError> {
        self.sign(TokenRequest::for_user(user, TokenPurpose::PasswordReset), self.reset_ttl)
    }
}
