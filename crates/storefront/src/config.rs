//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MONGODB_URI` - MongoDB connection string (unless `STORE_BACKEND=memory`)
//! - `JWT_SECRET` - Token verification secret (min 32 chars, no placeholders)
//!
//! ## Optional
//! - `STORE_BACKEND` - `mongodb` (default) or `memory`
//! - `MONGODB_DATABASE` - Database name (default: velour)
//! - `MONGODB_TRANSACTIONS` - Force transaction support `true`/`false`
//!   (default: probe the deployment at startup)
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3000)
//! - `ADMIN_EMAIL` - Recipient for new-order alerts (default: SMTP_FROM)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER`, `SMTP_PASS`, `SMTP_FROM` - SMTP
//!   relay; mail is simulated (logged) when any of host/user/pass is missing
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-", "changeme", "replace", "placeholder", "example", "secret", "password", "xxx", "todo",
    "fixme", "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Which order store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Mongodb,
    Memory,
}

/// SMTP relay configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from", &self.from)
            .finish()
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Store backend selector
    pub store_backend: StoreBackend,
    /// MongoDB connection string (contains credentials)
    pub mongodb_uri: SecretString,
    /// MongoDB database name
    pub mongodb_database: String,
    /// Transaction capability override; `None` probes at startup
    pub mongodb_transactions: Option<bool>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// JWT verification secret
    pub jwt_secret: SecretString,
    /// Recipient of admin new-order alerts
    pub admin_email: String,
    /// SMTP relay; `None` runs the mailer in simulated mode
    pub smtp: Option<SmtpConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing, fails to
    /// parse, or the JWT secret looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_backend = match optional("STORE_BACKEND").as_deref() {
            None | Some("mongodb") => StoreBackend::Mongodb,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar(
                    "STORE_BACKEND".to_owned(),
                    format!("expected mongodb or memory, got {other}"),
                ));
            }
        };

        let mongodb_uri = match store_backend {
            StoreBackend::Mongodb => required("MONGODB_URI")?,
            // The memory backend never dials out; keep a harmless default.
            StoreBackend::Memory => optional("MONGODB_URI")
                .unwrap_or_else(|| "mongodb://localhost:27017".to_owned()),
        };

        let jwt_secret = required("JWT_SECRET")?;
        validate_secret("JWT_SECRET", &jwt_secret)?;

        let host: IpAddr = parse_or("HOST", "127.0.0.1")?;
        let port: u16 = parse_or("PORT", "3000")?;

        let mongodb_transactions = match optional("MONGODB_TRANSACTIONS").as_deref() {
            None => None,
            Some("true" | "1") => Some(true),
            Some("false" | "0") => Some(false),
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar(
                    "MONGODB_TRANSACTIONS".to_owned(),
                    format!("expected true or false, got {other}"),
                ));
            }
        };

        let smtp = Self::smtp_from_env()?;
        let admin_email = optional("ADMIN_EMAIL")
            .or_else(|| smtp.as_ref().map(|s| s.from.clone()))
            .unwrap_or_else(|| "admin@example.com".to_owned());

        Ok(Self {
            store_backend,
            mongodb_uri: SecretString::from(mongodb_uri),
            mongodb_database: optional("MONGODB_DATABASE").unwrap_or_else(|| "velour".to_owned()),
            mongodb_transactions,
            host,
            port,
            jwt_secret: SecretString::from(jwt_secret),
            admin_email,
            smtp,
            sentry_dsn: optional("SENTRY_DSN"),
            sentry_environment: optional("SENTRY_ENVIRONMENT"),
        })
    }

    fn smtp_from_env() -> Result<Option<SmtpConfig>, ConfigError> {
        let (Some(host), Some(username), Some(password)) = (
            optional("SMTP_HOST"),
            optional("SMTP_USER"),
            optional("SMTP_PASS"),
        ) else {
            return Ok(None);
        };

        let port: u16 = parse_or("SMTP_PORT", "587")?;
        let from = optional("SMTP_FROM").unwrap_or_else(|| "no-reply@example.com".to_owned());

        Ok(Some(SmtpConfig {
            host,
            port,
            username,
            password: SecretString::from(password),
            from,
        }))
    }

    /// Socket address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Expose the JWT secret for token verification.
    #[must_use]
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.expose_secret().as_bytes()
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn required(name: &str) -> Result<String, ConfigError> {
    optional(name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_owned()))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let raw = optional(name).unwrap_or_else(|| default.to_owned());
    raw.parse()
        .map_err(|e| ConfigError::InvalidEnvVar(name.to_owned(), format!("{e}")))
}

/// Reject secrets that are too short or look like placeholders.
fn validate_secret(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            name.to_owned(),
            format!("must be at least {MIN_JWT_SECRET_LENGTH} characters"),
        ));
    }

    let lower = value.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                name.to_owned(),
                format!("contains placeholder pattern \"{pattern}\""),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_secret_accepts_strong_value() {
        assert!(validate_secret("JWT_SECRET", "k9PzR2mWq7vT4xH8bN3cJ6fL1dY5gA0e").is_ok());
    }

    #[test]
    fn test_validate_secret_rejects_short_value() {
        assert!(matches!(
            validate_secret("JWT_SECRET", "short"),
            Err(ConfigError::InsecureSecret(..))
        ));
    }

    #[test]
    fn test_validate_secret_rejects_placeholders() {
        assert!(validate_secret("JWT_SECRET", "changeme-changeme-changeme-changeme").is_err());
        assert!(validate_secret("JWT_SECRET", "your-super-duper-development-token").is_err());
    }
}
