use std::time::Duration;

use slack_command_core::{DispatchMode, DEFAULT_POST_TIMEOUT};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Receiver settings, read from the Lambda environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub signing_secret: String,
    pub endpoint: String,
    pub mode: DispatchMode,
    pub max_commands: Option<usize>,
    pub handler_timeout: Option<Duration>,
    pub post_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let signing_secret = lookup("SLACK_SIGNING_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing("SLACK_SIGNING_SECRET"))?;

        let endpoint = lookup("SLACK_ENDPOINT").unwrap_or_else(|| "/slack".to_string());
        if !endpoint.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "SLACK_ENDPOINT",
                reason: format!("{endpoint:?} must start with '/'"),
            });
        }

        let mode = match lookup("SLACK_DISPATCH_MODE") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                name: "SLACK_DISPATCH_MODE",
                reason,
            })?,
            // Lambda freezes the sandbox once the reply is sent, so detached
            // work is opt-in.
            None => DispatchMode::Inline,
        };

        let max_commands = lookup("SLACK_MAX_COMMANDS")
            .map(|raw| match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => Ok(limit),
                _ => Err(ConfigError::Invalid {
                    name: "SLACK_MAX_COMMANDS",
                    reason: format!("{raw:?} is not a positive number"),
                }),
            })
            .transpose()?;

        let handler_timeout = lookup("SLACK_HANDLER_TIMEOUT_SECS")
            .map(|raw| seconds("SLACK_HANDLER_TIMEOUT_SECS", &raw))
            .transpose()?;

        let post_timeout = lookup("SLACK_POST_TIMEOUT_SECS")
            .map(|raw| seconds("SLACK_POST_TIMEOUT_SECS", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_POST_TIMEOUT);

        Ok(Self {
            signing_secret,
            endpoint,
            mode,
            max_commands,
            handler_timeout,
            post_timeout,
        })
    }
}

fn seconds(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid {
            name,
            reason: format!("{raw:?} is not a positive number of seconds"),
        }),
    }
}
