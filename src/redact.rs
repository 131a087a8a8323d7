//! Masking for sensitive values at the logging boundary.
//!
//! Anything credential-shaped goes through here before it reaches a log
//! line; call sites never slice tokens inline.

/// Keeps the first `reveal` characters and masks the rest. Values short
/// enough to be recognizable from the prefix are masked entirely.
pub fn mask(value: &str, reveal: usize) -> String {
    let chars = value.chars().count();
    if chars <= reveal * 2 {
        return "***".to_string();
    }
    let prefix: String = value.chars().take(reveal).collect();
    format!("{prefix}***")
}

/// Default policy for API tokens.
pub fn token(value: &str) -> String {
    mask(value, 4)
}
