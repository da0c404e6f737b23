//! JWT issuing and verification
//!
//! A single `JwtManager` issues both halves of the session: a short-lived
//! access token and a longer-lived refresh token. The `typ` claim tells them
//! apart, so neither can stand in for the other.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AuthConfig, ConfigError};

/// Which half of the session a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i32,
    pub typ: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Freshly issued access and refresh tokens
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Expected a {expected:?} token")]
    WrongType { expected: TokenType },

    #[error("Invalid token: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct JwtManager {
    secret: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl JwtManager {
    pub fn new(secret: impl Into<String>, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Build from the `auth` config section, parsing the duration strings
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.jwt_secret.clone(),
            config.access_ttl_secs()?,
            config.refresh_ttl_secs()?,
        ))
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl_secs
    }

    /// Issue an access/refresh pair for a user
    pub fn issue_pair(&self, user_id: i32) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue(user_id, TokenType::Access)?,
            refresh_token: self.issue(user_id, TokenType::Refresh)?,
            access_ttl_secs: self.access_ttl_secs,
            refresh_ttl_secs: self.refresh_ttl_secs,
        })
    }

    pub fn issue(&self, user_id: i32, typ: TokenType) -> Result<String, TokenError> {
        let ttl = match typ {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            typ,
            iat: now,
            exp: now.saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX)),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        self.encode(&claims)
    }

    /// Verify signature, expiry and token type
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })?;

        if data.claims.typ != expected {
            return Err(TokenError::WrongType { expected });
        }
        Ok(data.claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}
