//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level. Installing twice
//! (tests, embedding hosts) returns an error instead of panicking.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Characters of a token kept visible in logs.
const TOKEN_VISIBLE_PREFIX: usize = 4;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Install the global fmt subscriber.
pub fn init(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level).map_err(|e| LoggingError::Filter {
            filter: settings.level.clone(),
            reason: e.to_string(),
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let installed = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|_| LoggingError::AlreadyInstalled)
}

/// Short, log-safe form of a credential.
pub fn redact_token(token: &str) -> String {
    let token = token.trim();
    if token.chars().count() <= TOKEN_VISIBLE_PREFIX * 2 {
        return "****".to_string();
    }
    let prefix: String = token.chars().take(TOKEN_VISIBLE_PREFIX).collect();
    format!("{prefix}****")
}
