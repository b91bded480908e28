//! Connection retry utilities
//!
//! Exponential backoff around any fallible operation. Only errors for which
//! [`DiscordIpcError::is_recoverable`] holds are retried; anything else is
//! returned straight away.

use log::debug;
use serde_json::Value;
use std::time::Duration;

use crate::error::{DiscordIpcError, Result};
use crate::session::SessionState;
use crate::sync::DiscordIpcClient;

/// Configuration for retry attempts
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff (typically 2.0)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(
        max_attempts: u32,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            backoff_multiplier,
        }
    }

    /// Create a retry configuration with a specific number of attempts and default delays
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Calculate the delay for a specific attempt number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(delay_ms)
    }

    /// Whether `err`, seen on attempt `attempt` (0-indexed), should be retried
    fn should_retry(&self, err: &DiscordIpcError, attempt: u32) -> bool {
        err.is_recoverable() && attempt + 1 < self.max_attempts
    }
}

fn exhausted() -> DiscordIpcError {
    DiscordIpcError::InvalidArgument("retry configuration allows no attempts".to_string())
}

/// Retry a fallible operation with exponential backoff
///
/// ```no_run
/// use presence_ipc::retry::{with_retry, RetryConfig};
/// use presence_ipc::DiscordIpcClient;
///
/// let mut client = DiscordIpcClient::new("your-client-id")?;
/// let config = RetryConfig::with_max_attempts(5);
/// with_retry(&config, || client.get_guilds())?;
/// # Ok::<(), presence_ipc::DiscordIpcError>(())
/// ```
pub fn with_retry<T, F>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    for attempt in 0..config.max_attempts {
        match operation() {
            Ok(result) => return Ok(result),
            Err(err) if config.should_retry(&err, attempt) => {
                let delay = config.delay_for_attempt(attempt);
                debug!("Attempt {} failed ({}), retrying in {:?}", attempt + 1, err, delay);
                std::thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }

    Err(exhausted())
}

/// Bring `client` to `Ready`, retrying while Discord is unavailable
///
/// A fresh client connects; one whose session ended reconnects.
pub fn connect_with_retry(client: &mut DiscordIpcClient, config: &RetryConfig) -> Result<Value> {
    with_retry(config, || match client.state() {
        SessionState::Disconnected => client.connect(),
        _ => client.reconnect(),
    })
}

/// Retry an async operation, sleeping on `runtime` between attempts
#[cfg(any(
    feature = "tokio-runtime",
    feature = "async-std-runtime",
    feature = "smol-runtime"
))]
pub async fn with_retry_on<R, T, F, Fut>(runtime: &R, config: &RetryConfig, mut operation: F) -> Result<T>
where
    R: crate::async_io::Runtime,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) if config.should_retry(&err, attempt) => {
                let delay = config.delay_for_attempt(attempt);
                debug!("Attempt {} failed ({}), retrying in {:?}", attempt + 1, err, delay);
                runtime.sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }

    Err(exhausted())
}

/// Retry an async operation with exponential backoff (Tokio runtime)
///
/// When the `tokio-runtime` feature is enabled this is also exported as
/// [`with_retry_async`].
#[cfg(feature = "tokio-runtime")]
pub async fn with_retry_async_tokio<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    with_retry_on(&crate::async_io::tokio::TokioRuntime, config, operation).await
}

/// Retry an async operation with exponential backoff (async-std runtime)
#[cfg(feature = "async-std-runtime")]
pub async fn with_retry_async_std<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    with_retry_on(&crate::async_io::async_std::AsyncStdRuntime, config, operation).await
}

/// Retry an async operation with exponential backoff (smol runtime)
#[cfg(feature = "smol-runtime")]
pub async fn with_retry_async_smol<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    with_retry_on(&crate::async_io::smol::SmolRuntime, config, operation).await
}

// Unified async retry API: tokio wins, then async-std, then smol.

/// Retry an async operation with exponential backoff (unified API)
#[cfg(feature = "tokio-runtime")]
pub use with_retry_async_tokio as with_retry_async;

#[cfg(all(feature = "async-std-runtime", not(feature = "tokio-runtime")))]
pub use with_retry_async_std as with_retry_async;

#[cfg(all(
    feature = "smol-runtime",
    not(feature = "tokio-runtime"),
    not(feature = "async-std-runtime")
))]
pub use with_retry_async_smol as with_retry_async;
