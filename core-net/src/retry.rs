//! # Retry Executor
//!
//! One shared "run this with bounded retries, exponential backoff, and a
//! timeout" primitive for every network-crossing operation. The session and
//! realtime layers reuse [`backoff_delay`] so the three backoff policies of
//! the system cannot drift apart.
//!
//! ## Algorithm
//!
//! Per attempt (1..=max_attempts):
//! 1. Consult the [`NetworkMonitor`]; a known-offline or known-poor link
//!    fails the whole call immediately (no wasted round-trip).
//! 2. Race the operation against the per-attempt timeout. The timer winning
//!    cancels the operation's [`CancellationToken`] and drops its future.
//! 3. Success returns immediately. Transient failures back off
//!    `min(initial_delay * 2^(attempt-1), max_delay)` and try again; fatal
//!    failures propagate at once with the attempt number and a network
//!    snapshot attached.

use bridge_traits::BridgeError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::monitor::{NetworkMonitor, NetworkState};

/// Per-call retry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    /// Attempt budget, including the first try
    pub max_attempts: u32,
    /// First backoff delay
    pub initial_delay: Duration,
    /// Backoff cap
    pub max_delay: Duration,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            timeout: Duration::from_millis(15_000),
        }
    }
}

/// Backoff delay after a failed attempt (1-based):
/// `min(initial_delay * 2^(attempt-1), max_delay)`.
///
/// Shared by session revalidation and channel reconnection so every backoff
/// in the system follows the same schedule shape.
pub fn backoff_delay(options: &RetryOptions, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    options
        .initial_delay
        .saturating_mul(1u32 << exponent)
        .min(options.max_delay)
}

/// Identity of the operation being retried, for diagnostics.
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub component: String,
    pub action: String,
}

impl RetryContext {
    pub fn new(component: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for RetryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.action)
    }
}

/// Failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError {
    /// Every attempt in the budget failed with a transient error.
    #[error("{context}: gave up after {attempts} attempts ({network}): {source}")]
    Exhausted {
        context: RetryContext,
        attempts: u32,
        network: NetworkState,
        /// One line per failed attempt, oldest first.
        history: Vec<String>,
        #[source]
        source: BridgeError,
    },
    /// A non-retryable error surfaced; no further attempts were made.
    #[error("{context}: fatal error on attempt {attempt} ({network}): {source}")]
    Fatal {
        context: RetryContext,
        attempt: u32,
        network: NetworkState,
        #[source]
        source: BridgeError,
    },
    /// The link was known-bad before an attempt; nothing was sent.
    #[error("{context}: skipped, link unusable ({network})")]
    Offline {
        context: RetryContext,
        network: NetworkState,
    },
}

impl RetryError {
    /// Attempts performed before this failure surfaced.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Fatal { attempt, .. } => *attempt,
            Self::Offline { .. } => 0,
        }
    }

    /// Whether the underlying failure forces the sign-out path.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            Self::Fatal { source, .. } if source.is_session_expired()
        )
    }

    /// Human-readable message for the UI boundary. Connectivity failures
    /// only become visible after the retry budget is spent.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } | Self::Offline { .. } => {
                "Connection problem. Please check your network and try again."
            }
            Self::Fatal { source, .. } if source.is_session_expired() => {
                "Your session has expired. Please sign in again."
            }
            Self::Fatal { .. } => "Something went wrong. Please try again.",
        }
    }
}

pub type RetryResult<T> = std::result::Result<T, RetryError>;

/// Bounded-retry runner consulting the network monitor before each attempt.
#[derive(Clone)]
pub struct RetryExecutor {
    monitor: Arc<NetworkMonitor>,
    defaults: RetryOptions,
}

impl RetryExecutor {
    pub fn new(monitor: Arc<NetworkMonitor>, defaults: RetryOptions) -> Self {
        Self { monitor, defaults }
    }

    /// Default options this executor was built with.
    pub fn defaults(&self) -> RetryOptions {
        self.defaults
    }

    /// Run `op` under the executor's default options.
    pub async fn execute<T, F, Fut>(&self, context: RetryContext, op: F) -> RetryResult<T>
    where
        F: Fn(CancellationToken) -> Fut,
        Fut: Future<Output = bridge_traits::error::Result<T>>,
    {
        self.execute_with(context, self.defaults, op).await
    }

    /// Run `op` with explicit options.
    ///
    /// `op` receives a fresh [`CancellationToken`] per attempt; the token is
    /// cancelled when the attempt's timeout elapses so spawned work can stop
    /// instead of running to a discarded result.
    pub async fn execute_with<T, F, Fut>(
        &self,
        context: RetryContext,
        options: RetryOptions,
        op: F,
    ) -> RetryResult<T>
    where
        F: Fn(CancellationToken) -> Fut,
        Fut: Future<Output = bridge_traits::error::Result<T>>,
    {
        let mut history = Vec::new();
        let mut last_error: Option<BridgeError> = None;

        for attempt in 1..=options.max_attempts {
            let network = self.monitor.state();
            if network.is_unusable() {
                warn!(%context, %network, attempt, "skipping attempt, link unusable");
                return Err(RetryError::Offline { context, network });
            }

            let token = CancellationToken::new();
            let outcome = match timeout(options.timeout, op(token.clone())).await {
                Ok(result) => result,
                Err(_) => {
                    token.cancel();
                    Err(BridgeError::Timeout(format!(
                        "{context} attempt {attempt} exceeded {:?}",
                        options.timeout
                    )))
                }
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(%context, attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() => {
                    history.push(format!("attempt {attempt}: {err}"));
                    warn!(%context, attempt, error = %err, "transient failure");
                    last_error = Some(err);

                    if attempt < options.max_attempts {
                        let delay = backoff_delay(&options, attempt);
                        debug!(%context, attempt, delay_ms = delay.as_millis() as u64, "backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    warn!(%context, attempt, error = %err, "fatal failure, not retrying");
                    return Err(RetryError::Fatal {
                        context,
                        attempt,
                        network: self.monitor.state(),
                        source: err,
                    });
                }
            }
        }

        let source = last_error
            .unwrap_or_else(|| BridgeError::OperationFailed("no attempts executed".to_string()));
        Err(RetryError::Exhausted {
            context,
            attempts: options.max_attempts,
            network: self.monitor.state(),
            history,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::QualityTier;
    use core_runtime::events::EventBus;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn executor() -> RetryExecutor {
        let monitor = Arc::new(NetworkMonitor::new(EventBus::new(8)));
        RetryExecutor::new(monitor, RetryOptions::default())
    }

    fn offline_executor() -> RetryExecutor {
        let monitor = Arc::new(NetworkMonitor::new(EventBus::new(8)));
        monitor.set_state(NetworkState {
            online: false,
            quality: QualityTier::Unknown,
        });
        RetryExecutor::new(monitor, RetryOptions::default())
    }

    fn ctx() -> RetryContext {
        RetryContext::new("test", "op")
    }

    #[test]
    fn test_backoff_schedule() {
        let options = RetryOptions {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            timeout: Duration::from_millis(15_000),
        };
        let delays: Vec<u64> = (1..=5)
            .map(|a| backoff_delay(&options, a).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_then_success() {
        let executor = executor();
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(ctx(), |_cancel| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err(BridgeError::Network("connection reset".to_string()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_fails_without_backoff_or_invocation() {
        let executor = offline_executor();
        let calls = AtomicU32::new(0);

        let started = Instant::now();
        let result = executor
            .execute(ctx(), |_cancel| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Offline { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poor_quality_skips_attempt() {
        let monitor = Arc::new(NetworkMonitor::new(EventBus::new(8)));
        monitor.set_state(NetworkState {
            online: true,
            quality: QualityTier::Poor,
        });
        let executor = RetryExecutor::new(monitor, RetryOptions::default());

        let result: RetryResult<()> = executor.execute(ctx(), |_cancel| async { Ok(()) }).await;
        assert!(matches!(result, Err(RetryError::Offline { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_propagates_immediately() {
        let executor = executor();
        let calls = AtomicU32::new(0);

        let result: RetryResult<()> = executor
            .execute(ctx(), |_cancel| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BridgeError::OperationFailed("row not found".to_string())) }
            })
            .await;

        match result {
            Err(RetryError::Fatal { attempt, .. }) => assert_eq!(attempt, 1),
            other => panic!("expected Fatal, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_carries_history() {
        let executor = executor();

        let result: RetryResult<()> = executor
            .execute(ctx(), |_cancel| async {
                Err(BridgeError::Network("fetch failed".to_string()))
            })
            .await;

        match result {
            Err(RetryError::Exhausted {
                attempts, history, ..
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(history.len(), 3);
                assert!(history[0].starts_with("attempt 1"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_twice_then_success_waits_backoff() {
        let monitor = Arc::new(NetworkMonitor::new(EventBus::new(8)));
        let options = RetryOptions {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            timeout: Duration::from_millis(500),
        };
        let executor = RetryExecutor::new(monitor, options);
        let calls = AtomicU32::new(0);

        let started = Instant::now();
        let result = executor
            .execute_with(ctx(), options, |_cancel| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        // Never resolves; the attempt timeout wins the race.
                        std::future::pending::<()>().await;
                        unreachable!()
                    }
                    Ok(attempt)
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 3);
        // Two timed-out attempts plus the 1000 + 2000 ms backoff waits.
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_token() {
        let monitor = Arc::new(NetworkMonitor::new(EventBus::new(8)));
        let options = RetryOptions {
            max_attempts: 1,
            timeout: Duration::from_millis(100),
            ..RetryOptions::default()
        };
        let executor = RetryExecutor::new(monitor, options);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = std::sync::Mutex::new(Some(tx));

        let result: RetryResult<()> = executor
            .execute_with(ctx(), options, |cancel| {
                let tx = tx.lock().unwrap().take();
                async move {
                    tokio::spawn(async move {
                        cancel.cancelled().await;
                        if let Some(tx) = tx {
                            let _ = tx.send(());
                        }
                    });
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { .. })));
        rx.await.expect("cancellation token was never cancelled");
    }

    #[test]
    fn test_user_messages() {
        let network = NetworkState::default();
        let exhausted = RetryError::Exhausted {
            context: ctx(),
            attempts: 3,
            network,
            history: vec![],
            source: BridgeError::Network("x".into()),
        };
        assert!(exhausted.user_message().contains("Connection problem"));

        let expired = RetryError::Fatal {
            context: ctx(),
            attempt: 1,
            network,
            source: BridgeError::SessionExpired("revoked".into()),
        };
        assert!(expired.is_session_expired());
        assert!(expired.user_message().contains("session has expired"));
    }
}
