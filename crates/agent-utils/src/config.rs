//! Environment configuration helpers
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file in the working directory.

use std::str::FromStr;
use thiserror::Error;

/// A set environment variable that could not be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: String, value: String },
}

/// Load `.env` into the process environment. Returns whether a file was found.
pub fn load_dotenv() -> bool {
    match dotenv::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Loaded .env file");
            true
        }
        Err(_) => false,
    }
}

/// Non-empty, trimmed value of `key`
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse `key` when it is set.
///
/// Unset or blank yields `Ok(None)`; a value that fails to parse is an error
/// rather than a silent default.
pub fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, EnvError> {
    match env_string(key) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| EnvError::Invalid {
            key: key.to_string(),
            value,
        }),
    }
}

/// Boolean flag: `1`, `true`, `yes` and `on` are true
pub fn env_flag(key: &str) -> bool {
    env_string(key).is_some_and(|value| {
        matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names so they can run in parallel.

    #[test]
    fn test_env_string() {
        unsafe {
            std::env::set_var("AGENT_UTILS_TEST_STRING", "  value  ");
            std::env::set_var("AGENT_UTILS_TEST_BLANK", "   ");
        }
        assert_eq!(
            env_string("AGENT_UTILS_TEST_STRING"),
            Some("value".to_string())
        );
        assert_eq!(env_string("AGENT_UTILS_TEST_BLANK"), None);
        assert_eq!(env_string("AGENT_UTILS_TEST_MISSING"), None);
    }

    #[test]
    fn test_env_parse() {
        unsafe {
            std::env::set_var("AGENT_UTILS_TEST_NUMBER", "42");
            std::env::set_var("AGENT_UTILS_TEST_BAD_NUMBER", "forty");
        }
        assert_eq!(env_parse::<usize>("AGENT_UTILS_TEST_NUMBER"), Ok(Some(42)));
        assert_eq!(env_parse::<usize>("AGENT_UTILS_TEST_UNSET_NUMBER"), Ok(None));
        assert_eq!(
            env_parse::<usize>("AGENT_UTILS_TEST_BAD_NUMBER"),
            Err(EnvError::Invalid {
                key: "AGENT_UTILS_TEST_BAD_NUMBER".to_string(),
                value: "forty".to_string(),
            })
        );
    }

    #[test]
    fn test_env_flag() {
        unsafe {
            std::env::set_var("AGENT_UTILS_TEST_FLAG_ON", "Yes");
            std::env::set_var("AGENT_UTILS_TEST_FLAG_OFF", "0");
        }
        assert!(env_flag("AGENT_UTILS_TEST_FLAG_ON"));
        assert!(!env_flag("AGENT_UTILS_TEST_FLAG_OFF"));
        assert!(!env_flag("AGENT_UTILS_TEST_FLAG_UNSET"));
    }
}
