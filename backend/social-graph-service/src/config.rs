/// Configuration management for the social graph engine
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Store access settings
    pub store: StoreConfig,
    /// Push and media presentation settings
    pub delivery: DeliveryConfig,
    /// Recommendation engine settings
    pub recommendations: RecommendationConfig,
}

/// Store access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Upper bound for a single store call, in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after an optimistic-commit conflict or timeout
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry backoff, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Push notification and media URL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Title shown on every push notification
    pub push_title: String,
    /// Upper bound for a single push send, in milliseconds
    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,
    /// Prefix for image and avatar URLs
    pub media_url_prefix: String,
}

/// Recommendation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Cap on the liked-hashtag accumulator kept per user
    #[serde(default = "default_max_recommended_hashtags")]
    pub max_recommended_hashtags: usize,
}

// Default values
fn default_store_timeout_ms() -> u64 {
    resilience::store_config().timeout.duration.as_millis() as u64
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    10
}

fn default_push_timeout_ms() -> u64 {
    resilience::push_config().timeout.duration.as_millis() as u64
}

fn default_max_recommended_hashtags() -> usize {
    50
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            store: StoreConfig {
                timeout_ms: default_store_timeout_ms(),
                max_retries: default_max_retries(),
                retry_backoff_ms: default_retry_backoff_ms(),
            },
            delivery: DeliveryConfig {
                push_title: "Photo Feed".to_string(),
                push_timeout_ms: default_push_timeout_ms(),
                media_url_prefix: "/images".to_string(),
            },
            recommendations: RecommendationConfig {
                max_recommended_hashtags: default_max_recommended_hashtags(),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let store = StoreConfig {
            timeout_ms: env_or("STORE_TIMEOUT_MS", defaults.store.timeout_ms),
            max_retries: env_or("STORE_MAX_RETRIES", defaults.store.max_retries),
            retry_backoff_ms: env_or("STORE_RETRY_BACKOFF_MS", defaults.store.retry_backoff_ms),
        };

        let delivery = DeliveryConfig {
            push_title: std::env::var("PUSH_TITLE").unwrap_or(defaults.delivery.push_title),
            push_timeout_ms: env_or("PUSH_TIMEOUT_MS", defaults.delivery.push_timeout_ms),
            media_url_prefix: std::env::var("MEDIA_URL_PREFIX")
                .unwrap_or(defaults.delivery.media_url_prefix),
        };

        let recommendations = RecommendationConfig {
            max_recommended_hashtags: env_or(
                "MAX_RECOMMENDED_HASHTAGS",
                defaults.recommendations.max_recommended_hashtags,
            ),
        };

        let config = Config {
            env: std::env::var("APP_ENV").unwrap_or(defaults.env),
            store,
            delivery,
            recommendations,
        };
        config.validate().context("Invalid social graph configuration")?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.store.timeout_ms > 0, "STORE_TIMEOUT_MS must be positive");
        anyhow::ensure!(
            self.recommendations.max_recommended_hashtags > 0,
            "MAX_RECOMMENDED_HASHTAGS must be positive"
        );
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.timeout_ms)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery.push_timeout_ms)
    }

    /// Retry policy for conflicting or timed-out units of work, built on the
    /// shared store preset
    pub fn retry_config(&self) -> resilience::RetryConfig {
        resilience::RetryConfig {
            max_retries: self.store.max_retries,
            initial_backoff: Duration::from_millis(self.store.retry_backoff_ms),
            ..resilience::store_config().retry
        }
    }
}
