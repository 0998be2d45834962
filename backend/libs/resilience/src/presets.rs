/// Preset configurations for the engine's collaborators
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Configuration bundle for a collaborator type
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub timeout: TimeoutConfig,
    pub retry: RetryConfig,
}

/// Backing store calls (fetch, scan, commit)
///
/// - Timeout: 5s per call
/// - Retry: 5 attempts, short backoff; commits are conditional so a retry
///   re-reads state instead of duplicating writes
pub fn store_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(5),
        },
        retry: RetryConfig {
            max_retries: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: true,
        },
    }
}

/// Push delivery (FCM/APNs style senders)
///
/// - Timeout: 10s
/// - Retry: none, delivery is fire-and-forget
pub fn push_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(10),
        },
        retry: RetryConfig {
            max_retries: 0,
            ..Default::default()
        },
    }
}
