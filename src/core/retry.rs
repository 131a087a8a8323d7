use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::errors::FetchError;
use crate::models::{Account, Post};

/// Provider of recent timeline posts for one account. Implementations
/// return a small bounded window in any stable order; callers re-sort.
#[async_trait]
pub trait SourceFetcher {
    async fn fetch_recent(&self, account: &Account) -> Result<Vec<Post>, FetchError>;
}

/// Retry policy for a single account's fetch path.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total fetch attempts per account per run.
    pub max_attempts: u32,
    /// Ceiling on any single wait and on cumulative sleep per account.
    pub wait_cap: Duration,
    /// Added on top of provider reset hints.
    pub reset_buffer: Duration,
    /// Backoff base when the provider gives no reset hint.
    pub backoff_base: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            wait_cap: Duration::from_secs(300),
            reset_buffer: Duration::from_secs(5),
            backoff_base: Duration::from_secs(30),
        }
    }
}

/// Wraps a [`SourceFetcher`] with bounded rate-limit-aware retries.
///
/// An explicit loop carries the attempt counter. Cumulative sleep per
/// account never exceeds `wait_cap`, so one throttled account cannot starve
/// the rest of the run.
pub struct RateLimitedRetrier<F> {
    fetcher: F,
    config: RetryConfig,
}

impl<F: SourceFetcher> RateLimitedRetrier<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, RetryConfig::default())
    }

    pub fn with_config(fetcher: F, config: RetryConfig) -> Self {
        RateLimitedRetrier { fetcher, config }
    }

    pub async fn fetch(&self, account: &Account) -> Result<Vec<Post>, FetchError> {
        let mut slept = Duration::ZERO;
        let mut last_err = FetchError::Transient("no fetch attempted".to_string());

        for attempt in 0..self.config.max_attempts {
            match self.fetcher.fetch_recent(account).await {
                Ok(posts) => return Ok(posts),
                Err(FetchError::RateLimited { reset_at }) => {
                    let wait = match reset_at {
                        Some(reset) => {
                            // Provider-supplied reset time plus a small buffer;
                            // a hint already in the past means retry now.
                            let secs = reset.signed_duration_since(Utc::now()).num_seconds()
                                + self.config.reset_buffer.as_secs() as i64;
                            if secs <= 0 {
                                Duration::ZERO
                            } else {
                                Duration::from_secs(secs as u64)
                            }
                        }
                        None => self.backoff(attempt),
                    };

                    if wait > self.config.wait_cap || slept + wait > self.config.wait_cap {
                        warn!(
                            account = account.display(),
                            wait_secs = wait.as_secs(),
                            "rate limit reset too far out, skipping account for this run"
                        );
                        return Err(FetchError::RateLimited { reset_at });
                    }

                    last_err = FetchError::RateLimited { reset_at };
                    if attempt + 1 == self.config.max_attempts {
                        break;
                    }
                    if !wait.is_zero() {
                        info!(
                            account = account.display(),
                            wait_secs = wait.as_secs(),
                            attempt,
                            "rate limited, waiting before retry"
                        );
                        sleep(wait).await;
                        slept += wait;
                    }
                }
                Err(FetchError::Transient(msg)) => {
                    warn!(
                        account = account.display(),
                        error = %msg,
                        attempt,
                        "transient fetch error"
                    );
                    last_err = FetchError::Transient(msg);
                    if attempt + 1 == self.config.max_attempts {
                        break;
                    }
                    let wait = self.backoff(attempt);
                    if slept + wait > self.config.wait_cap {
                        break;
                    }
                    sleep(wait).await;
                    slept += wait;
                }
                // Definitive failures: no retry will change the answer.
                Err(err) => return Err(err),
            }
        }

        Err(last_err)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedFetcher {
        responses: Mutex<VecDeque<Result<Vec<Post>, FetchError>>>,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<Vec<Post>, FetchError>>) -> Self {
            ScriptedFetcher {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceFetcher for ScriptedFetcher {
        async fn fetch_recent(&self, _account: &Account) -> Result<Vec<Post>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Transient("script exhausted".to_string())))
        }
    }

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            text: format!("post {id}"),
            created_at: None,
        }
    }

    fn account() -> Account {
        Account::new("nasa")
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_hint_waits_once_then_retries() {
        let reset_at = Utc::now() + chrono::Duration::seconds(30);
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::RateLimited {
                reset_at: Some(reset_at),
            }),
            Ok(vec![post("1")]),
        ]);
        let retrier = RateLimitedRetrier::new(fetcher);

        let started = tokio::time::Instant::now();
        let posts = retrier.fetch(&account()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(posts.len(), 1);
        assert_eq!(retrier.fetcher.calls(), 2);
        // One sleep of roughly reset + 5s buffer
        assert!(elapsed >= Duration::from_secs(34), "slept {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(36), "slept {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_hint_beyond_cap_aborts_without_retry() {
        let reset_at = Utc::now() + chrono::Duration::seconds(400);
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::RateLimited {
            reset_at: Some(reset_at),
        })]);
        let retrier = RateLimitedRetrier::new(fetcher);

        let started = tokio::time::Instant::now();
        let err = retrier.fetch(&account()).await.unwrap_err();

        assert!(matches!(err, FetchError::RateLimited { .. }));
        assert_eq!(retrier.fetcher.calls(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reset_hint_retries_immediately() {
        let reset_at = Utc::now() - chrono::Duration::seconds(60);
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::RateLimited {
                reset_at: Some(reset_at),
            }),
            Ok(vec![]),
        ]);
        let retrier = RateLimitedRetrier::new(fetcher);

        let started = tokio::time::Instant::now();
        retrier.fetch(&account()).await.unwrap();

        assert_eq!(retrier.fetcher.calls(), 2);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_hint_uses_exponential_backoff() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::RateLimited { reset_at: None }),
            Err(FetchError::RateLimited { reset_at: None }),
            Ok(vec![post("1")]),
        ]);
        let retrier = RateLimitedRetrier::new(fetcher);

        let started = tokio::time::Instant::now();
        retrier.fetch(&account()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(retrier.fetcher.calls(), 3);
        // 30s then 60s
        assert!(elapsed >= Duration::from_secs(90), "slept {elapsed:?}");
        assert!(elapsed < Duration::from_secs(92), "slept {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::RateLimited { reset_at: None }),
            Err(FetchError::RateLimited { reset_at: None }),
            Err(FetchError::RateLimited { reset_at: None }),
            Ok(vec![post("1")]),
        ]);
        let retrier = RateLimitedRetrier::new(fetcher);

        let err = retrier.fetch(&account()).await.unwrap_err();
        assert!(matches!(err, FetchError::RateLimited { .. }));
        assert_eq!(retrier.fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retry_up_to_ceiling() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::Transient("timeout".to_string())),
            Err(FetchError::Transient("503".to_string())),
            Err(FetchError::Transient("connection reset".to_string())),
        ]);
        let retrier = RateLimitedRetrier::new(fetcher);

        let err = retrier.fetch(&account()).await.unwrap_err();
        assert!(matches!(err, FetchError::Transient(_)));
        assert_eq!(retrier.fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        for err in [
            FetchError::NotFound,
            FetchError::InvalidAccount,
            FetchError::Permanent("403".to_string()),
        ] {
            let fetcher = ScriptedFetcher::new(vec![Err(err.clone()), Ok(vec![post("1")])]);
            let retrier = RateLimitedRetrier::new(fetcher);

            retrier.fetch(&account()).await.unwrap_err();
            assert_eq!(retrier.fetcher.calls(), 1);
        }
    }
}
