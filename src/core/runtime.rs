use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::core::reconcile::{reconcile, NotificationSink};
use crate::core::retry::{RateLimitedRetrier, SourceFetcher};
use crate::memory::StateStore;
use crate::models::{Account, BotState};

/// Aggregated result of one pass over every configured account.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub accounts_processed: usize,
    pub posts_notified: usize,
    pub fetch_failures: usize,
    pub delivery_failures: usize,
}

/// One-shot runner. Each invocation makes a single pass over the configured
/// accounts; scheduling across invocations belongs to the host (cron or CI).
pub struct Runtime<F, S> {
    accounts: Vec<Account>,
    retrier: RateLimitedRetrier<F>,
    sink: S,
    store: StateStore,
    state: BotState,
}

impl<F: SourceFetcher, S: NotificationSink> Runtime<F, S> {
    pub fn new(
        accounts: Vec<Account>,
        retrier: RateLimitedRetrier<F>,
        sink: S,
        store: StateStore,
    ) -> Self {
        let state = store.load();
        Runtime {
            accounts,
            retrier,
            sink,
            store,
            state,
        }
    }

    /// Runs once and, if the run itself fails, pushes a best-effort failure
    /// report through the sink. The report attempt can never raise.
    pub async fn run_guarded(&mut self) -> Result<RunSummary> {
        match self.run().await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                error!(error = %err, "run failed unexpectedly");
                let text = format!("❌ tweet-relay run failed: {err}");
                if let Err(notify_err) = self.sink.deliver(&text).await {
                    warn!(error = %notify_err, "failed to deliver the failure report");
                }
                Err(err)
            }
        }
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        if self.state.counters.maybe_reset(Utc::now().date_naive()) {
            info!("monthly call counter reset");
        }

        let mut summary = RunSummary::default();
        let accounts = self.accounts.clone();
        for account in &accounts {
            info!(account = account.display(), "checking timeline");
            self.state.counters.monthly_calls += 1;

            match self.retrier.fetch(account).await {
                Ok(posts) => {
                    let outcome = reconcile(account, &posts, &mut self.state, &self.sink).await;
                    summary.posts_notified += outcome.notified.len();
                    if outcome.failed.is_some() {
                        summary.delivery_failures += 1;
                    }
                }
                Err(err) => {
                    // One account's failure never aborts the others.
                    warn!(account = account.display(), error = %err, "fetch failed");
                    summary.fetch_failures += 1;
                }
            }
            summary.accounts_processed += 1;

            // Persist after every account: a few extra writes in exchange
            // for a smaller duplicate window if the process dies mid-run.
            if let Err(err) = self.store.save(&self.state) {
                warn!(
                    error = %err,
                    "failed to persist state, a later run may re-notify recent posts"
                );
            }
        }

        info!(
            accounts = summary.accounts_processed,
            notified = summary.posts_notified,
            fetch_failures = summary.fetch_failures,
            delivery_failures = summary.delivery_failures,
            monthly_calls = self.state.counters.monthly_calls,
            "run complete"
        );
        Ok(summary)
    }

    #[cfg(test)]
    fn state(&self) -> &BotState {
        &self.state
    }
}
