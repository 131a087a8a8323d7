use chrono::{DateTime, Utc};
use thiserror::Error;

/// Fatal startup problems. Nothing is fetched or delivered once one of these
/// surfaces.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("no accounts configured in TWITTER_USERNAMES")]
    NoAccounts,
    #[error("TELEGRAM_CHAT_ID must be a numeric chat id or an @channel name, got {0:?}")]
    InvalidChatId(String),
}

/// Failure modes of a timeline fetch, scoped to a single account.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("rate limited{}", reset_hint(.reset_at))]
    RateLimited { reset_at: Option<DateTime<Utc>> },
    #[error("account not found")]
    NotFound,
    #[error("invalid account")]
    InvalidAccount,
    #[error("transient error: {0}")]
    Transient(String),
    #[error("permanent error: {0}")]
    Permanent(String),
}

fn reset_hint(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(" until {}", at.to_rfc3339()),
        None => String::new(),
    }
}

/// A notification the sink refused or failed to send.
#[derive(Debug, Clone, Error)]
#[error("delivery failed: {reason}")]
pub struct DeliveryError {
    pub reason: String,
}

impl DeliveryError {
    pub fn new(reason: impl Into<String>) -> Self {
        DeliveryError {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_display_includes_hint() {
        let err = FetchError::RateLimited { reset_at: None };
        assert_eq!(err.to_string(), "rate limited");

        let at = DateTime::parse_from_rfc3339("2025-10-27T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let err = FetchError::RateLimited { reset_at: Some(at) };
        assert!(err.to_string().contains("2025-10-27T12:00:00"));
    }
}
