//! Runtime settings for a suite run.
//!
//! Values come from the process environment, with a `.env` file in the
//! working directory filling in anything that is not already set.

use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to load .env file")]
    Dotenv(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct Config {
    /// Base url of the deployment under test, without a trailing slash.
    base_url: String,
    /// Existing WebDriver endpoint. When unset a geckodriver is spawned.
    pub webdriver_url: Option<String>,
    pub headed: bool,
    /// Pause applied after navigation and clicks so a watcher can follow.
    pub action_delay: Duration,
    pub wait_timeout: Duration,
    pub artifacts_dir: PathBuf,
    session_cookie: Option<SecretString>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = non_empty("TARGET_URL")
            .ok_or(ConfigError::Missing("TARGET_URL"))?
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(ConfigError::Invalid {
                var: "TARGET_URL",
                value: base_url,
                reason: "must name a host".into(),
            });
        }

        let headed = match non_empty("HEADED") {
            Some(value) => parse_flag("HEADED", value)?,
            None => false,
        };
        let action_delay = match non_empty("ACTION_DELAY_MS") {
            Some(value) => {
                Duration::from_millis(parse_number("ACTION_DELAY_MS", value)?)
            }
            None => Duration::from_millis(500),
        };
        let wait_timeout = match non_empty("WAIT_TIMEOUT_SECS") {
            Some(value) => {
                Duration::from_secs(parse_number("WAIT_TIMEOUT_SECS", value)?)
            }
            None => Duration::from_secs(30),
        };

        let session_cookie = match non_empty("SESSION_COOKIE") {
            Some(value) => {
                if !value.contains('=') || value.starts_with('=') {
                    // The value is a credential, keep it out of the error.
                    return Err(ConfigError::Invalid {
                        var: "SESSION_COOKIE",
                        value: "<redacted>".into(),
                        reason: "expected name=value".into(),
                    });
                }
                Some(SecretString::from(value))
            }
            None => None,
        };

        Ok(Config {
            base_url,
            webdriver_url: non_empty("WEBDRIVER_URL"),
            headed,
            action_delay,
            wait_timeout,
            artifacts_dir: non_empty("ARTIFACTS_DIR")
                .unwrap_or_else(|| "artifacts".into())
                .into(),
            session_cookie,
        })
    }

    /// Headed when either the caller or `HEADED` asks for it.
    pub fn with_headed(mut self, requested: bool) -> Self {
        self.headed |= requested;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute url for a site path. Leading slashes on `path` are ignored.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Name and value of the configured session cookie.
    pub fn session_cookie(&self) -> Option<(String, String)> {
        let raw = self.session_cookie.as_ref()?.expose_secret();
        let (name, value) = raw.split_once('=')?;
        Some((name.trim().to_string(), value.trim().to_string()))
    }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected a boolean".into(),
        }),
    }
}

fn parse_number(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        var,
        value,
        reason: e.to_string(),
    })
}
