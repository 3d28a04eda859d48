//! Typed application configuration.
//!
//! Loaded from a TOML file (path taken from `CONFIG_PATH`, default
//! `config.toml`) with environment-variable fallbacks for secrets and the
//! database URL. Every section is validated up front via
//! [`AppConfig::normalize_and_validate`]; a failed validation is a startup
//! error, never a lazy runtime one.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_acquire_timeout() -> u64 { 30 }

/// Settings for the symmetric JWT signer.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing secret. Must be at least 32 bytes.
    #[serde(default)]
    pub secret_key: String,
    pub issuer: String,
    pub audience: String,
    #[serde(default = "default_expiration_minutes")]
    pub expiration_minutes: i64,
}

fn default_expiration_minutes() -> i64 { 60 }

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            issuer: "library-api".into(),
            audience: "library-clients".into(),
            expiration_minutes: default_expiration_minutes(),
        }
    }
}

/// Two-tier expiry for cached read results: a short sliding window refreshed
/// on access, capped by a longer absolute bound.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_sliding_secs")]
    pub sliding_secs: u64,
    #[serde(default = "default_absolute_secs")]
    pub absolute_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

fn default_sliding_secs() -> u64 { 5 * 60 }
fn default_absolute_secs() -> u64 { 30 * 60 }
fn default_max_entries() -> u64 { 10_000 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sliding_secs: default_sliding_secs(),
            absolute_secs: default_absolute_secs(),
            max_entries: default_max_entries(),
        }
    }
}

pub fn load_default() -> Result<AppConfig, ConfigError> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    let cfg: AppConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(cfg)
}

impl AppConfig {
    /// Load from the default path, pull env fallbacks, and validate.
    pub fn load_and_validate() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<(), ConfigError> {
        self.database.normalize_from_env();
        self.database.validate()?;
        self.jwt.normalize_from_env();
        self.jwt.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    /// Fill the URL from `DATABASE_URL` when the TOML omits it.
    pub fn normalize_from_env(&mut self) {
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "database.url is empty; set it in config.toml or DATABASE_URL".into(),
            ));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgres://")
            || lower.starts_with("postgresql://")
            || lower.starts_with("sqlite:"))
        {
            return Err(ConfigError::Invalid(
                "database.url must be a postgres:// or sqlite: URL".into(),
            ));
        }
        if self.min_connections == 0 {
            return Err(ConfigError::Invalid("database.min_connections must be >= 1".into()));
        }
        if self.max_connections < self.min_connections {
            return Err(ConfigError::Invalid(
                "database.max_connections must be >= min_connections".into(),
            ));
        }
        if self.acquire_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "database.acquire_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl JwtConfig {
    /// Fill the secret from `JWT_SECRET_KEY` when the TOML omits it.
    pub fn normalize_from_env(&mut self) {
        if self.secret_key.is_empty() {
            if let Ok(secret) = std::env::var("JWT_SECRET_KEY") {
                self.secret_key = secret;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.len() < 32 {
            return Err(ConfigError::Invalid(
                "jwt.secret_key must be at least 32 bytes".into(),
            ));
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt.issuer is not configured".into()));
        }
        if self.audience.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt.audience is not configured".into()));
        }
        if self.expiration_minutes <= 0 {
            return Err(ConfigError::Invalid("jwt.expiration_minutes must be >= 1".into()));
        }
        Ok(())
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sliding_secs == 0 || self.absolute_secs == 0 {
            return Err(ConfigError::Invalid("cache expirations must be positive".into()));
        }
        if self.sliding_secs > self.absolute_secs {
            return Err(ConfigError::Invalid(
                "cache.sliding_secs must not exceed cache.absolute_secs".into(),
            ));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_jwt() -> JwtConfig {
        JwtConfig {
            secret_key: "0123456789abcdef0123456789abcdef".into(),
            issuer: "library-api".into(),
            audience: "library-clients".into(),
            expiration_minutes: 60,
        }
    }

    #[test]
    fn jwt_secret_shorter_than_32_bytes_is_rejected() {
        let mut cfg = valid_jwt();
        cfg.secret_key = "too-short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn jwt_secret_of_exactly_32_bytes_is_accepted() {
        assert!(valid_jwt().validate().is_ok());
    }

    #[test]
    fn jwt_requires_issuer_audience_and_positive_ttl() {
        let mut cfg = valid_jwt();
        cfg.issuer = "  ".into();
        assert!(cfg.validate().is_err());

        let mut cfg = valid_jwt();
        cfg.audience = String::new();
        assert!(cfg.validate().is_err());

        let mut cfg = valid_jwt();
        cfg.expiration_minutes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cache_sliding_must_not_exceed_absolute() {
        let cfg = CacheConfig { sliding_secs: 600, absolute_secs: 300, max_entries: 100 };
        assert!(cfg.validate().is_err());
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn database_url_scheme_is_checked() {
        let mut cfg = DatabaseConfig {
            url: "mysql://nope".into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 30,
            sqlx_logging: false,
        };
        assert!(cfg.validate().is_err());

        cfg.url = "sqlite::memory:".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn toml_defaults_fill_missing_sections() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [database]
            url = "sqlite::memory:"

            [jwt]
            secret_key = "0123456789abcdef0123456789abcdef"
            issuer = "library-api"
            audience = "library-clients"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.jwt.expiration_minutes, 60);
        assert_eq!(cfg.cache.sliding_secs, 300);
        assert_eq!(cfg.cache.absolute_secs, 1800);
    }
}
