use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Day of the month on which the provider's monthly call quota renews.
pub const COUNTER_RESET_DAY: u32 = 27;

/// A monitored timeline. Comparison is case-insensitive via `key`; original
/// casing is kept for display and permalinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    display: String,
    key: String,
}

impl Account {
    pub fn new(raw: &str) -> Self {
        let display = raw.trim().trim_start_matches('@').to_string();
        let key = display.to_lowercase();
        Account { display, key }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    /// Store key: lowercased, leading sigil stripped.
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn permalink(&self, handle: &str) -> String {
        format!("https://twitter.com/{}/status/{}", handle, self.id)
    }
}

/// Orders post IDs the way the provider assigns them: numerically when both
/// sides parse as integers, lexicographically otherwise. Plain string
/// ordering would put "9" after "10".
pub fn cmp_post_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u128>(), b.parse::<u128>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Per-account record of everything already relayed. IDs are never removed
/// once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccountHistory {
    #[serde(default)]
    pub notified_ids: HashSet<String>,
    #[serde(default)]
    pub last_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunCounters {
    #[serde(default)]
    pub monthly_calls: u64,
    #[serde(default)]
    pub last_reset: Option<NaiveDate>,
}

impl RunCounters {
    /// Applies the monthly reset transition for `today`; returns true when
    /// the counter was zeroed. The comparison is against the stored reset
    /// date, so the reset fires at most once per window no matter how many
    /// runs land past the boundary.
    pub fn maybe_reset(&mut self, today: NaiveDate) -> bool {
        if today.day() < COUNTER_RESET_DAY {
            return false;
        }
        if let Some(last) = self.last_reset {
            if last.year() == today.year() && last.month() == today.month() {
                return false;
            }
        }
        self.monthly_calls = 0;
        self.last_reset = NaiveDate::from_ymd_opt(today.year(), today.month(), COUNTER_RESET_DAY);
        true
    }
}

/// Everything that outlives a single run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotState {
    #[serde(default)]
    pub accounts: HashMap<String, AccountHistory>,
    #[serde(default)]
    pub counters: RunCounters,
}

impl BotState {
    pub fn history_mut(&mut self, account: &Account) -> &mut AccountHistory {
        self.accounts.entry(account.key().to_string()).or_default()
    }

    pub fn is_notified(&self, account: &Account, post_id: &str) -> bool {
        self.accounts
            .get(account.key())
            .map_or(false, |h| h.notified_ids.contains(post_id))
    }

    /// Idempotent: recording an already-present ID is a no-op.
    pub fn record_notified(&mut self, account: &Account, post_id: &str) {
        let history = self.history_mut(account);
        history.notified_ids.insert(post_id.to_string());
        let newer = history
            .last_id
            .as_deref()
            .map_or(true, |last| cmp_post_ids(post_id, last) == Ordering::Greater);
        if newer {
            history.last_id = Some(post_id.to_string());
        }
    }
}
