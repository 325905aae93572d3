pub mod env;
pub mod merge;
pub mod schema;

pub use schema::*;

use crate::cli::{Cli, Commands};
use crate::error::ConfigError;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const LOCAL_CONFIG_FILE: &str = "flowbot.toml";

/// Load configuration by merging global, file, environment, and CLI sources.
/// Precedence: CLI > environment > config file > global config > defaults.
///
/// Missing config files are handled gracefully (defaults apply). An explicit
/// `--config` path must exist and parse.
pub fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    // Layer 1: Global config (~/.config/flowbot/flowbot.toml or platform equivalent)
    let global = load_global_config();

    // Layer 2: Explicit --config file, or ./flowbot.toml
    let file = match &cli.config {
        Some(path) => load_explicit_config(path)?,
        None => load_toml_file(Path::new(LOCAL_CONFIG_FILE)).unwrap_or_default(),
    };

    // Layer 3: FLOWBOT_* environment variables
    let env = PartialConfig::from_env().context("Invalid FLOWBOT_* environment variable")?;

    // Layer 4: CLI args
    let cli_partial = cli_to_partial(cli)?;

    let config = cli_partial
        .with_fallback(env)
        .with_fallback(file)
        .with_fallback(global)
        .finalize()?;

    Ok(config)
}

/// Parse TOML text into a config layer.
pub fn parse_config_str(contents: &str, path: &Path) -> Result<PartialConfig, ConfigError> {
    toml::from_str::<ConfigFile>(contents)
        .map(ConfigFile::to_partial)
        .map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Load global config from the platform-specific config directory.
/// Returns empty PartialConfig if file not found.
fn load_global_config() -> PartialConfig {
    match global_config_path() {
        Some(p) => load_toml_file(&p).unwrap_or_default(),
        None => {
            tracing::debug!("Could not determine global config directory");
            PartialConfig::default()
        }
    }
}

/// Load a config file the user asked for by path. Errors are fatal.
fn load_explicit_config(path: &Path) -> anyhow::Result<PartialConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let partial = parse_config_str(&contents, path)?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(partial)
}

/// Load and parse a TOML config file into a PartialConfig.
/// Returns None on file-not-found; parse errors are logged and ignored.
fn load_toml_file(path: &Path) -> Option<PartialConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match parse_config_str(&contents, path) {
            Ok(partial) => {
                tracing::info!("Loaded config from {}", path.display());
                Some(partial)
            }
            Err(e) => {
                tracing::warn!("Config parse error: {e}");
                None
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Failed to read config at {}: {}", path.display(), e);
            None
        }
    }
}

/// Resolve the platform-specific global config path.
/// Linux: ~/.config/flowbot/flowbot.toml
/// macOS: ~/Library/Application Support/flowbot/flowbot.toml
fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "flowbot")
        .map(|dirs| dirs.config_dir().join(LOCAL_CONFIG_FILE))
}

/// Convert CLI arguments to a PartialConfig for merging.
pub fn cli_to_partial(cli: &Cli) -> Result<PartialConfig, ConfigError> {
    let mut partial = PartialConfig {
        base_url: cli.base_url.clone(),
        ..Default::default()
    };

    if let Commands::Run {
        bot_id,
        payload,
        token,
        max_attempts,
        interval,
    } = &cli.command
    {
        partial.bot_id = bot_id.clone();
        partial.token = token.clone();
        partial.max_poll_attempts = *max_attempts;
        partial.poll_interval_secs = *interval;
        partial.payload = payload
            .as_deref()
            .map(|raw| {
                serde_json::from_str(raw).map_err(|e| ConfigError::InvalidValue {
                    key: "--payload".to_string(),
                    value: raw.to_string(),
                    message: format!("not valid JSON: {e}"),
                })
            })
            .transpose()?;
    }

    Ok(partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    #[test]
    fn parses_full_config_file() {
        let toml = r#"
            [remote]
            base_url = "https://bots.example.com/api"
            token = "file-token"
            request_timeout_secs = 12

            [job]
            bot_id = "digest-bot"
            payload = { channel = "news", limit = 5 }

            [polling]
            max_attempts = 20
            interval_secs = 3

            [logging]
            run_log_dir = "/tmp/flowbot-runs"
        "#;

        let partial = parse_config_str(toml, Path::new("flowbot.toml")).unwrap();
        assert_eq!(partial.base_url.as_deref(), Some("https://bots.example.com/api"));
        assert_eq!(partial.token.as_deref(), Some("file-token"));
        assert_eq!(partial.request_timeout_secs, Some(12));
        assert_eq!(partial.bot_id.as_deref(), Some("digest-bot"));
        assert_eq!(partial.payload, Some(json!({"channel": "news", "limit": 5})));
        assert_eq!(partial.max_poll_attempts, Some(20));
        assert_eq!(partial.poll_interval_secs, Some(3));
        assert_eq!(partial.run_log_dir, Some(PathBuf::from("/tmp/flowbot-runs")));
    }

    #[test]
    fn empty_file_is_empty_layer() {
        let partial = parse_config_str("", Path::new("flowbot.toml")).unwrap();
        assert_eq!(partial, PartialConfig::default());
    }

    #[test]
    fn malformed_file_reports_path() {
        let err = parse_config_str("[polling\nmax_attempts = ", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn missing_local_file_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load_toml_file(&tmp.path().join("absent.toml")).is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load_explicit_config(&tmp.path().join("absent.toml")).is_err());
    }

    #[test]
    fn cli_run_flags_become_partial() {
        let cli = Cli::parse_from([
            "flowbot",
            "--base-url",
            "http://cli",
            "run",
            "--bot-id",
            "b1",
            "--payload",
            r#"{"x": 1}"#,
            "--token",
            "cli-token",
            "--max-attempts",
            "4",
            "--interval",
            "1",
        ]);

        let partial = cli_to_partial(&cli).unwrap();
        assert_eq!(partial.base_url.as_deref(), Some("http://cli"));
        assert_eq!(partial.bot_id.as_deref(), Some("b1"));
        assert_eq!(partial.payload, Some(json!({"x": 1})));
        assert_eq!(partial.token.as_deref(), Some("cli-token"));
        assert_eq!(partial.max_poll_attempts, Some(4));
        assert_eq!(partial.poll_interval_secs, Some(1));
    }

    #[test]
    fn cli_bad_payload_is_an_error() {
        let cli = Cli::parse_from(["flowbot", "run", "--payload", "{oops"]);
        assert!(cli_to_partial(&cli).is_err());
    }

    #[test]
    fn tool_command_resolves_without_base_url() {
        let cli = Cli::parse_from(["flowbot", "tool", "ping"]);
        let config = cli_to_partial(&cli)
            .unwrap()
            .with_fallback(PartialConfig::default())
            .finalize()
            .unwrap();
        assert!(config.base_url.is_none());
        assert_eq!(config.max_poll_attempts, 60);
    }

    #[test]
    fn cli_tool_command_only_sets_globals() {
        let cli = Cli::parse_from(["flowbot", "tool", "ping"]);
        assert_eq!(cli_to_partial(&cli).unwrap(), PartialConfig::default());
    }
}
