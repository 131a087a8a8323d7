use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::retry::SourceFetcher;
use crate::errors::FetchError;
use crate::models::{Account, Post};

const DEFAULT_BASE_URL: &str = "https://api.twitter.com";
const RESET_HEADER: &str = "x-rate-limit-reset";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PAGE_SIZE: u32 = 5;

#[derive(Debug, Deserialize)]
struct UserLookup {
    #[serde(default)]
    data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TweetsPage {
    #[serde(default)]
    data: Vec<ApiTweet>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Timeline fetcher over the Twitter API v2 with bearer-token auth.
///
/// Fetching is a two-step sequence: resolve the numeric user ID from the
/// handle, then page the user's recent tweets. Resolved IDs are cached for
/// the life of the process so the lookup is paid once per account.
pub struct TwitterSource {
    client: reqwest::Client,
    bearer_token: String,
    base_url: String,
    user_ids: Mutex<HashMap<String, String>>,
}

impl TwitterSource {
    pub fn new(bearer_token: &str) -> Self {
        Self::with_base_url(bearer_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(bearer_token: &str, base_url: &str) -> Self {
        TwitterSource {
            client: reqwest::Client::new(),
            bearer_token: bearer_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_ids: Mutex::new(HashMap::new()),
        }
    }

    async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, FetchError> {
        self.client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))
    }

    async fn user_id(&self, account: &Account) -> Result<String, FetchError> {
        if let Some(id) = self.user_ids.lock().await.get(account.key()) {
            return Ok(id.clone());
        }

        debug!(account = account.display(), "looking up user id");
        let url = format!("{}/2/users/by/username/{}", self.base_url, account.display());
        let response = self.get(&url, &[]).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, reset_header(&response)));
        }
        let lookup: UserLookup = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        // The v2 API reports suspended or protected users inside `errors`
        // with a 200 status; no `data` means no usable account.
        let id = lookup.data.map(|d| d.id).ok_or(FetchError::NotFound)?;
        self.user_ids
            .lock()
            .await
            .insert(account.key().to_string(), id.clone());
        Ok(id)
    }
}

#[async_trait]
impl SourceFetcher for TwitterSource {
    async fn fetch_recent(&self, account: &Account) -> Result<Vec<Post>, FetchError> {
        let user_id = self.user_id(account).await?;

        debug!(account = account.display(), "fetching recent tweets");
        let url = format!("{}/2/users/{}/tweets", self.base_url, user_id);
        let query = [
            ("max_results", PAGE_SIZE.to_string()),
            ("tweet.fields", "created_at".to_string()),
        ];
        let response = self.get(&url, &query).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, reset_header(&response)));
        }
        let page: TweetsPage = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        Ok(page
            .data
            .into_iter()
            .map(|t| Post {
                id: t.id,
                text: t.text,
                created_at: t.created_at,
            })
            .collect())
    }
}

fn reset_header(response: &reqwest::Response) -> Option<i64> {
    response
        .headers()
        .get(RESET_HEADER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Maps a non-success HTTP status to the fetch error taxonomy.
fn classify_status(status: StatusCode, reset_epoch: Option<i64>) -> FetchError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited {
            reset_at: reset_epoch.and_then(|secs| DateTime::from_timestamp(secs, 0)),
        },
        StatusCode::NOT_FOUND => FetchError::NotFound,
        StatusCode::BAD_REQUEST => FetchError::InvalidAccount,
        s if s.is_server_error() => FetchError::Transient(format!("server error {s}")),
        s => FetchError::Permanent(format!("unexpected status {s}")),
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_classify_status_taxonomy() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(1_760_000_000)),
            FetchError::RateLimited { reset_at: Some(_) }
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, None),
            FetchError::RateLimited { reset_at: None }
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None),
            FetchError::NotFound
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None),
            FetchError::InvalidAccount
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, None),
            FetchError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None),
            FetchError::Permanent(_)
        ));
    }
}
