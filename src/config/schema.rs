use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use crate::bot::PollSettings;

/// The TOML file structure for flowbot.toml.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub remote: Option<RemoteConfig>,
    pub job: Option<JobConfig>,
    pub polling: Option<PollingConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub bot_id: Option<String>,
    /// Default launch payload; any TOML value, converted to JSON.
    pub payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PollingConfig {
    pub max_attempts: Option<u32>,
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub run_log_dir: Option<String>,
}

impl ConfigFile {
    pub fn to_partial(self) -> PartialConfig {
        let remote = self.remote;
        let job = self.job;
        let polling = self.polling;

        PartialConfig {
            base_url: remote.as_ref().and_then(|r| r.base_url.clone()),
            token: remote.as_ref().and_then(|r| r.token.clone()),
            request_timeout_secs: remote.as_ref().and_then(|r| r.request_timeout_secs),
            bot_id: job.as_ref().and_then(|j| j.bot_id.clone()),
            payload: job.and_then(|j| j.payload),
            max_poll_attempts: polling.as_ref().and_then(|p| p.max_attempts),
            poll_interval_secs: polling.as_ref().and_then(|p| p.interval_secs),
            run_log_dir: self
                .logging
                .and_then(|l| l.run_log_dir)
                .map(PathBuf::from),
        }
    }
}

/// Fully-resolved runtime configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Required only by commands that reach the remote bot API.
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub request_timeout_secs: u64,
    pub bot_id: Option<String>,
    pub payload: Option<Value>,
    pub max_poll_attempts: u32,
    pub poll_interval_secs: u64,
    pub run_log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::new(
            self.max_poll_attempts,
            Duration::from_secs(self.poll_interval_secs),
        )
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("bot_id", &self.bot_id)
            .field("payload", &self.payload)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("run_log_dir", &self.run_log_dir)
            .finish()
    }
}

/// Partial config used during merge. All fields are Option so that
/// missing fields don't override lower-priority values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub bot_id: Option<String>,
    pub payload: Option<Value>,
    pub max_poll_attempts: Option<u32>,
    pub poll_interval_secs: Option<u64>,
    pub run_log_dir: Option<PathBuf>,
}
