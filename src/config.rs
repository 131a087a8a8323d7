use std::env;
use std::path::PathBuf;

use crate::errors::ConfigError;
use crate::models::Account;

const DEFAULT_STATE_FILE: &str = "./storage/state.json";

/// Resolved runtime configuration, built once in `main` and handed to the
/// components that need it. No module-level globals.
#[derive(Debug, Clone)]
pub struct Config {
    pub accounts: Vec<Account>,
    pub twitter_bearer_token: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub state_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let usernames = require_var("TWITTER_USERNAMES")?;
        let accounts = parse_accounts(&usernames);
        if accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }

        Ok(Config {
            accounts,
            twitter_bearer_token: require_var("TWITTER_BEARER_TOKEN")?,
            telegram_bot_token: require_var("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: require_var("TELEGRAM_CHAT_ID")?,
            state_file: env::var("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_FILE)),
        })
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Splits the comma-separated account list, dropping empty entries.
pub fn parse_accounts(raw: &str) -> Vec<Account> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Account::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accounts_splits_and_normalizes() {
        let accounts = parse_accounts("@NASA, spacex ,,@ESA");
        let keys: Vec<_> = accounts.iter().map(|a| a.key()).collect();
        assert_eq!(keys, vec!["nasa", "spacex", "esa"]);
        assert_eq!(accounts[0].display(), "NASA");
    }

    #[test]
    fn test_parse_accounts_empty_input() {
        assert!(parse_accounts("").is_empty());
        assert!(parse_accounts(" , ,").is_empty());
    }
}
