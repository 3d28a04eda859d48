//! Stateless bearer tokens.
//!
//! HS256 JWTs over a shared secret. No session state is kept anywhere:
//! validity is entirely a function of the signature and the embedded claims.
//! Expiry is checked against a caller-supplied clock with zero leeway, so a
//! token is valid for exactly its TTL and not a second longer.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use configs::{ConfigError, JwtConfig};

use crate::domain::UserProfile;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Tampered signature, wrong issuer/audience, or otherwise undecodable.
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("token encoding failed: {0}")]
    Encode(String),
}

/// Identity claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email.
    pub sub: String,
    /// User id.
    pub uid: Uuid,
    /// Username.
    pub name: String,
    pub email: String,
    /// Unique token id.
    pub jti: Uuid,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds. Exclusive: the token is invalid at `exp`.
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenIssuer {
    /// Fails fast on bad configuration (secret shorter than 32 bytes, blank
    /// issuer/audience, non-positive TTL); never lazily at first request.
    pub fn new(cfg: &JwtConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&cfg.issuer]);
        validation.set_audience(&[&cfg.audience]);
        // Expiry is checked manually against the caller's clock.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret_key.as_bytes()),
            validation,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.expiration_minutes),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &UserProfile, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.email.clone(),
            uid: user.id,
            name: user.username.clone(),
            email: user.email.clone(),
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Valid iff the signature, issuer, and audience match and
    /// `iat <= now < exp`. Every failure mode is just "invalid" to callers;
    /// there is no partial trust.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| TokenError::Invalid)?;
        let claims = data.claims;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        if now.timestamp() < claims.iat {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}
