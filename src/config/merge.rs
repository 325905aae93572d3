use super::schema::{AppConfig, PartialConfig};
use crate::bot::poller::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS};
use crate::error::ConfigError;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

impl PartialConfig {
    /// Merge self with a lower-priority fallback.
    /// Self's non-None values take precedence.
    pub fn with_fallback(self, fallback: PartialConfig) -> PartialConfig {
        PartialConfig {
            base_url: self.base_url.or(fallback.base_url),
            token: self.token.or(fallback.token),
            request_timeout_secs: self.request_timeout_secs.or(fallback.request_timeout_secs),
            bot_id: self.bot_id.or(fallback.bot_id),
            payload: self.payload.or(fallback.payload),
            max_poll_attempts: self.max_poll_attempts.or(fallback.max_poll_attempts),
            poll_interval_secs: self.poll_interval_secs.or(fallback.poll_interval_secs),
            run_log_dir: self.run_log_dir.or(fallback.run_log_dir),
        }
    }

    /// Convert to AppConfig, filling any remaining gaps with defaults.
    ///
    /// The base URL has no default; it stays `None` until a command that
    /// talks to the remote API asks for it.
    pub fn finalize(self) -> Result<AppConfig, ConfigError> {
        let base_url = self.base_url.filter(|u| !u.trim().is_empty());

        let request_timeout_secs = self
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs".to_string(),
                value: "0".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }

        Ok(AppConfig {
            base_url,
            token: self.token.filter(|t| !t.is_empty()),
            request_timeout_secs,
            bot_id: self.bot_id.filter(|b| !b.is_empty()),
            payload: self.payload,
            max_poll_attempts: self.max_poll_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            poll_interval_secs: self
                .poll_interval_secs
                .unwrap_or(DEFAULT_INTERVAL.as_secs()),
            run_log_dir: self.run_log_dir,
        })
    }
}
