use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::DeliveryError;
use crate::models::{cmp_post_ids, Account, BotState, Post};

/// Destination for rendered notifications. The sink owns any length limits.
#[async_trait]
pub trait NotificationSink {
    async fn deliver(&self, text: &str) -> Result<(), DeliveryError>;
}

/// What reconciliation did for one account.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Post IDs delivered and recorded this run, oldest first.
    pub notified: Vec<String>,
    pub failed: Option<FailedDelivery>,
}

#[derive(Debug)]
pub struct FailedDelivery {
    pub post_id: String,
    pub error: DeliveryError,
}

/// Diffs fetched posts against history and relays the new ones.
///
/// New posts are delivered oldest-first regardless of provider response
/// order. Each ID is recorded in memory immediately after its send succeeds,
/// so a crash mid-batch re-notifies at most the posts after the crash point.
/// The first delivery failure stops the account's batch: the failed ID stays
/// unrecorded and blocks newer posts until it goes through on a later run.
pub async fn reconcile<S: NotificationSink>(
    account: &Account,
    posts: &[Post],
    state: &mut BotState,
    sink: &S,
) -> ReconcileOutcome {
    let mut new_posts: Vec<&Post> = posts
        .iter()
        .filter(|p| !state.is_notified(account, &p.id))
        .collect();
    new_posts.sort_by(|a, b| cmp_post_ids(&a.id, &b.id));

    let mut outcome = ReconcileOutcome::default();
    for post in new_posts {
        if state.is_notified(account, &post.id) {
            continue;
        }
        let message = render_message(account, post);
        match sink.deliver(&message).await {
            Ok(()) => {
                state.record_notified(account, &post.id);
                outcome.notified.push(post.id.clone());
                info!(account = account.display(), post_id = %post.id, "notified");
            }
            Err(error) => {
                warn!(
                    account = account.display(),
                    post_id = %post.id,
                    error = %error,
                    "delivery failed, stopping this account's batch"
                );
                outcome.failed = Some(FailedDelivery {
                    post_id: post.id.clone(),
                    error,
                });
                break;
            }
        }
    }
    outcome
}

pub fn render_message(account: &Account, post: &Post) -> String {
    let when = post
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown time".to_string());
    format!(
        "🕊 <b>New post from @{handle}</b>\n\n{text}\n\n🕒 {when}\n🔗 <a href=\"{link}\">View post</a>",
        handle = escape_html(account.display()),
        text = escape_html(&post.text),
        link = post.permalink(account.display()),
    )
}

/// Minimal escaping for Telegram's HTML parse mode.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
