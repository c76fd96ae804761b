//! Checkout configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKETPLACE_API_URL` - Base URL of the marketplace data service
//! - `MARKETPLACE_API_TOKEN` - Bearer token for the data service
//! - `MARKETPLACE_STOREFRONT_URL` - Public storefront URL (order detail pages)
//!
//! ## Optional
//! - `MARKETPLACE_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `CHECKOUT_POLL_INTERVAL_SECS` - Payment status poll interval (default: 5)
//! - `CHECKOUT_POLL_MAX_ATTEMPTS` - Poll ticks before giving up (default: 60)
//! - `CHECKOUT_SUCCESS_REDIRECT_MS` - Delay before leaving a paid order (default: 2000)
//! - `MERCADOPAGO_SANDBOX` - Use `sandbox_init_point` redirects (default: false)
//! - `CITY_CACHE_TTL_SECS` - City reference list cache TTL (default: 3600)
//! - `LOG_FORMAT` - `json` for JSON log lines, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::str::FromStr;
use std::time::Duration;

use marketplace_core::OrderId;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::watcher::WatchConfig;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "insert",
    "put-your",
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

/// Checkout configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Marketplace data service configuration
    pub api: ApiConfig,
    /// Public storefront URL, always ending in `/`
    pub storefront_url: Url,
    /// Payment confirmation polling
    pub watch: WatchConfig,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Marketplace data service configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL, always ending in `/`
    pub base_url: Url,
    /// Bearer token
    pub token: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
    /// How long the city reference list stays cached
    pub city_cache_ttl: Duration,
    /// Redirect to the gateway sandbox instead of production
    pub use_sandbox: bool,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("city_cache_ttl", &self.city_cache_ttl)
            .field("use_sandbox", &self.use_sandbox)
            .finish()
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`CheckoutConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let token = env.required("MARKETPLACE_API_TOKEN")?;
        validate_secret_strength(&token, "MARKETPLACE_API_TOKEN")?;

        let api = ApiConfig {
            base_url: env.url("MARKETPLACE_API_URL")?,
            token: SecretString::from(token),
            timeout: Duration::from_secs(env.parsed_or("MARKETPLACE_HTTP_TIMEOUT_SECS", 15)?),
            city_cache_ttl: Duration::from_secs(env.parsed_or("CITY_CACHE_TTL_SECS", 3600)?),
            use_sandbox: env.parsed_or("MERCADOPAGO_SANDBOX", false)?,
        };

        let max_attempts: u32 = env.parsed_or("CHECKOUT_POLL_MAX_ATTEMPTS", 60)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_POLL_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let interval_secs: u64 = env.parsed_or("CHECKOUT_POLL_INTERVAL_SECS", 5)?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_POLL_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let watch = WatchConfig {
            interval: Duration::from_secs(interval_secs),
            max_attempts,
            success_delay: Duration::from_millis(
                env.parsed_or("CHECKOUT_SUCCESS_REDIRECT_MS", 2000)?,
            ),
        };

        Ok(Self {
            api,
            storefront_url: env.url("MARKETPLACE_STOREFRONT_URL")?,
            watch,
            log_json: env
                .optional("LOG_FORMAT")
                .is_some_and(|v| v.eq_ignore_ascii_case("json")),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// URL of the order detail page on the storefront.
    #[must_use]
    pub fn order_detail_url(&self, order_id: OrderId) -> Url {
        order_detail_url(&self.storefront_url, order_id)
    }

    /// The subset of settings a checkout session needs.
    #[must_use]
    pub fn flow(&self) -> FlowSettings {
        FlowSettings {
            storefront_url: self.storefront_url.clone(),
            watch: self.watch.clone(),
            use_sandbox: self.api.use_sandbox,
        }
    }
}

/// Settings that drive one checkout session.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    /// Public storefront URL, always ending in `/`
    pub storefront_url: Url,
    /// Payment confirmation polling
    pub watch: WatchConfig,
    /// Prefer the gateway's sandbox redirect
    pub use_sandbox: bool,
}

impl FlowSettings {
    /// URL of the order detail page on the storefront.
    #[must_use]
    pub fn order_detail_url(&self, order_id: OrderId) -> Url {
        order_detail_url(&self.storefront_url, order_id)
    }
}

/// Build the order detail URL under a storefront base URL.
#[must_use]
pub fn order_detail_url(storefront_url: &Url, order_id: OrderId) -> Url {
    let mut url = storefront_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("pedidos").push(&order_id.to_string());
    }
    url
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable parsed into `T`, or a default when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Get a required base URL, normalized to end with `/`.
    fn url(&self, key: &str) -> Result<Url, ConfigError> {
        let raw = self.required(key)?;
        let mut url = Url::parse(raw.trim())
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must be an absolute http(s) URL".to_string(),
            ));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

/// Validate that a secret is not a placeholder.
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

    Ok(())
}

impl ApiConfig {
    /// Expose the bearer token for building the `Authorization` header.
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}
