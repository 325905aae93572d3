use std::path::PathBuf;
use std::time::Duration;

/// Errors related to configuration loading and parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config at {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: `{value}` ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Errors that abort a launch. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("no bearer token available for bot '{bot_id}'")]
    MissingCredential { bot_id: String },

    #[error("launch request failed: {0}")]
    Network(String),

    #[error("launch rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("launch response is not valid JSON: {0}")]
    Malformed(String),

    #[error("launch response has no execution identifier")]
    MissingExecutionId,
}

/// A network-layer failure while talking to the remote API. Recoverable by retry.
#[derive(Debug, thiserror::Error)]
#[error("transient network error: {0}")]
pub struct TransientNetworkError(pub String);

/// Errors surfaced by a workflow run, one per failed stage.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("launch failed: {0}")]
    Launch(#[from] LaunchError),

    #[error("execution {execution_id} failed: {detail}")]
    JobFailed { execution_id: String, detail: String },

    #[error(
        "execution {execution_id} did not finish after {attempts} attempts ({}s)",
        bound.as_secs_f64()
    )]
    PollTimeout {
        execution_id: String,
        attempts: u32,
        bound: Duration,
    },

    #[error("workflow cancelled{}", execution_id.as_deref().map(|id| format!(" (execution {id})")).unwrap_or_default())]
    Cancelled { execution_id: Option<String> },
}

impl WorkflowError {
    /// The execution this error belongs to, if a launch got that far.
    pub fn execution_id(&self) -> Option<&str> {
        match self {
            Self::Launch(_) => None,
            Self::JobFailed { execution_id, .. } | Self::PollTimeout { execution_id, .. } => {
                Some(execution_id)
            }
            Self::Cancelled { execution_id } => execution_id.as_deref(),
        }
    }
}

/// Errors from the user registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("User with ID {0} not found")]
    NotFound(String),

    #[error("Invalid user field `{field}`: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}
