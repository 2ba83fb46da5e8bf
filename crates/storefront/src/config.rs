//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHOPFRONT_BASE_URL` - Public URL for the storefront
//! - `SHOPFRONT_JWT_SECRET` - HS256 signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `SHOPFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPFRONT_PORT` - Listen port (default: 3000)
//! - `SHOPFRONT_ACCESS_TOKEN_TTL_SECS` - Access token lifetime (default: 900)
//! - `SHOPFRONT_REFRESH_TOKEN_TTL_SECS` - Refresh token lifetime (default: 604800)
//! - `SHOPFRONT_REFRESH_THRESHOLD_SECS` - Refresh when this close to expiry (default: 300)
//! - `SHOPFRONT_SHIELD_MODE` - `live` or `dry_run` (default: live)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::services::protection::ShieldMode;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront, without trailing slash
    pub base_url: String,
    /// Token lifetimes and signing key
    pub auth: AuthConfig,
    /// Request shield mode
    pub shield_mode: ShieldMode,
    /// Sentry error tracking
    pub sentry: SentryConfig,
}

/// JWT signing and lifetime settings.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: SecretString,
    /// Lifetime of access tokens
    pub access_ttl: Duration,
    /// Lifetime of refresh tokens
    pub refresh_ttl: Duration,
    /// Access tokens this close to expiry are refreshed silently
    pub refresh_threshold: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("refresh_threshold", &self.refresh_threshold)
            .finish()
    }
}

/// Sentry settings.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database_url = env
            .get("SHOPFRONT_DATABASE_URL")
            .or_else(|| env.get("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("SHOPFRONT_DATABASE_URL".to_string()))?;
        let host = env.parse_or("SHOPFRONT_HOST", "127.0.0.1".parse::<IpAddr>().ok())?;
        let port = env.parse_or("SHOPFRONT_PORT", Some(3000_u16))?;
        let base_url = normalize_base_url(&env.required("SHOPFRONT_BASE_URL")?)?;

        let jwt_secret = env.required("SHOPFRONT_JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "SHOPFRONT_JWT_SECRET")?;
        validate_secret_strength(&jwt_secret, "SHOPFRONT_JWT_SECRET")?;

        let auth = AuthConfig {
            jwt_secret: SecretString::from(jwt_secret),
            access_ttl: Duration::from_secs(
                env.parse_or("SHOPFRONT_ACCESS_TOKEN_TTL_SECS", Some(900_u64))?,
            ),
            refresh_ttl: Duration::from_secs(
                env.parse_or("SHOPFRONT_REFRESH_TOKEN_TTL_SECS", Some(604_800_u64))?,
            ),
            refresh_threshold: Duration::from_secs(
                env.parse_or("SHOPFRONT_REFRESH_THRESHOLD_SECS", Some(300_u64))?,
            ),
        };
        auth.validate()?;

        let shield_mode = env.parse_or("SHOPFRONT_SHIELD_MODE", Some(ShieldMode::Live))?;

        let sentry = SentryConfig {
            dsn: env.get("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            environment: env.get("SENTRY_ENVIRONMENT"),
            sample_rate: env.parse_or("SENTRY_SAMPLE_RATE", Some(1.0_f32))?,
            traces_sample_rate: env.parse_or("SENTRY_TRACES_SAMPLE_RATE", Some(0.0_f32))?,
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            auth,
            shield_mode,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether auth cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// The scheme/host/port origin of the base URL, as browsers send it in `Origin`.
    #[must_use]
    pub fn origin(&self) -> String {
        Url::parse(&self.base_url)
            .map(|url| url.origin().ascii_serialization())
            .unwrap_or_else(|_| self.base_url.clone())
    }
}

impl AuthConfig {
    /// Check that the refresh threshold is shorter than the access lifetime,
    /// which in turn is shorter than the refresh lifetime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` naming the offending variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_ttl.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_ACCESS_TOKEN_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if self.refresh_threshold >= self.access_ttl {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_REFRESH_THRESHOLD_SECS".to_string(),
                format!(
                    "must be less than the access token TTL ({}s)",
                    self.access_ttl.as_secs()
                ),
            ));
        }
        if self.access_ttl >= self.refresh_ttl {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_REFRESH_TOKEN_TTL_SECS".to_string(),
                format!(
                    "must be greater than the access token TTL ({}s)",
                    self.access_ttl.as_secs()
                ),
            ));
        }
        Ok(())
    }

    /// Expose the signing secret bytes for key construction.
    #[must_use]
    pub fn secret_bytes(&self) -> &[u8] {
        self.jwt_secret.expose_secret().as_bytes()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Parse `key` if set, otherwise use `default`.
    fn parse_or<T>(&self, key: &str, default: Option<T>) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
            None => default.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string())),
        }
    }
}

/// Validate the base URL and strip any trailing slash.
fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        ConfigError::InvalidEnvVar("SHOPFRONT_BASE_URL".to_string(), e.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "SHOPFRONT_BASE_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Validate that the JWT secret meets minimum length requirements.
fn validate_jwt_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                secret.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
