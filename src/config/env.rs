//! `FLOWBOT_*` environment variables as a config layer.

use std::path::PathBuf;
use std::str::FromStr;

use super::schema::PartialConfig;
use crate::error::ConfigError;

pub const ENV_BASE_URL: &str = "FLOWBOT_BASE_URL";
pub const ENV_TOKEN: &str = "FLOWBOT_TOKEN";
pub const ENV_BOT_ID: &str = "FLOWBOT_BOT_ID";
pub const ENV_PAYLOAD: &str = "FLOWBOT_PAYLOAD";
pub const ENV_MAX_POLL_ATTEMPTS: &str = "FLOWBOT_MAX_POLL_ATTEMPTS";
pub const ENV_POLL_INTERVAL_SECS: &str = "FLOWBOT_POLL_INTERVAL_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "FLOWBOT_REQUEST_TIMEOUT_SECS";
pub const ENV_RUN_LOG_DIR: &str = "FLOWBOT_RUN_LOG_DIR";

impl PartialConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<PartialConfig, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a layer from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<PartialConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let payload = match get(ENV_PAYLOAD) {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
                key: ENV_PAYLOAD.to_string(),
                value: raw.clone(),
                message: format!("not valid JSON: {e}"),
            })?),
            None => None,
        };

        Ok(PartialConfig {
            base_url: get(ENV_BASE_URL),
            token: get(ENV_TOKEN),
            request_timeout_secs: parse_number(ENV_REQUEST_TIMEOUT_SECS, get(ENV_REQUEST_TIMEOUT_SECS))?,
            bot_id: get(ENV_BOT_ID),
            payload,
            max_poll_attempts: parse_number(ENV_MAX_POLL_ATTEMPTS, get(ENV_MAX_POLL_ATTEMPTS))?,
            poll_interval_secs: parse_number(ENV_POLL_INTERVAL_SECS, get(ENV_POLL_INTERVAL_SECS))?,
            run_log_dir: get(ENV_RUN_LOG_DIR).map(PathBuf::from),
        })
    }
}

fn parse_number<T>(key: &str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
            message: e.to_string(),
        })
    })
    .transpose()
}
