/// Resilience patterns for the social graph engine
///
/// This library provides the patterns every store-backed mutation relies on:
/// - **Timeout**: Enforces a time limit on each store or collaborator call
/// - **Retry**: Exponential backoff with jitter for retryable failures
///   (optimistic-commit conflicts, timeouts)
/// - **Preset Configurations**: Pre-tuned settings for the store and push delivery
///
/// # Example: Store Commit with Timeout and Conflict Retry
///
/// ```rust,no_run
/// use resilience::{presets, with_retry_if, with_timeout_result, RetryError, TimeoutError};
///
/// #[derive(Debug)]
/// enum CommitError {
///     Conflict,
///     Timeout,
/// }
///
/// impl std::fmt::Display for CommitError {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         write!(f, "{:?}", self)
///     }
/// }
///
/// impl From<TimeoutError> for CommitError {
///     fn from(_: TimeoutError) -> Self {
///         CommitError::Timeout
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::store_config();
///     let deadline = config.timeout.duration;
///
///     let result: Result<u64, RetryError<CommitError>> = with_retry_if(
///         config.retry,
///         |e: &CommitError| matches!(e, CommitError::Conflict | CommitError::Timeout),
///         || with_timeout_result(deadline, async { Ok::<u64, CommitError>(1) }),
///     )
///     .await;
///     assert!(result.is_ok());
/// }
/// ```

pub mod presets;
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use presets::{push_config, store_config, ServiceConfig};
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, with_timeout_result, TimeoutConfig, TimeoutError};
