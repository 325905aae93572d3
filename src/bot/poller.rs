//! Completion poller: drives one execution to a terminal state.
//!
//! Each attempt issues exactly one status request; the next attempt is not
//! started until the previous one has answered or failed. Outcomes per
//! attempt:
//!
//! | Observed                      | Action                               |
//! |-------------------------------|--------------------------------------|
//! | `Succeeded`                   | return the status                    |
//! | `Failed`                      | return [`WorkflowError::JobFailed`]  |
//! | `InProgress` / unrecognized   | wait one interval, poll again        |
//! | transient network error       | log, wait one interval, poll again   |
//!
//! When the attempt budget runs out the poller returns
//! [`WorkflowError::PollTimeout`]. Status requests and waits are raced
//! against a [`CancellationToken`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::client::ExecutionBackend;
use super::run_log::{EventSender, RunEvent, emit};
use super::types::{JobHandle, JobState, JobStatus};
use crate::error::WorkflowError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Attempt budget and fixed cadence for status polling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl PollSettings {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Wall-clock bound reported on timeout: attempts × interval.
    pub fn bound(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// Polls a single execution until it reaches a terminal state.
pub struct CompletionPoller<'a> {
    backend: &'a dyn ExecutionBackend,
    settings: PollSettings,
    events: Option<&'a EventSender>,
}

impl<'a> CompletionPoller<'a> {
    pub fn new(backend: &'a dyn ExecutionBackend, settings: PollSettings) -> Self {
        Self {
            backend,
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<&'a EventSender>) -> Self {
        self.events = events;
        self
    }

    /// Poll until `Succeeded`, `Failed`, budget exhaustion, or cancellation.
    pub async fn wait_for_completion(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, WorkflowError> {
        let execution_id = handle.execution_id();
        let max_attempts = self.settings.max_attempts;

        for attempt in 1..=max_attempts {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(execution_id)),
                fetched = self.backend.fetch_status(handle) => fetched,
            };

            match fetched {
                Ok(status) => {
                    emit(
                        self.events,
                        RunEvent::PollAttempt {
                            execution_id: execution_id.to_string(),
                            attempt,
                            max_attempts,
                            state: status.raw_state.clone(),
                        },
                    );

                    match status.state {
                        Some(JobState::Succeeded) => {
                            tracing::info!(%execution_id, attempt, state = %status.raw_state, "Execution succeeded");
                            self.emit_terminal(execution_id, &status);
                            return Ok(status);
                        }
                        Some(JobState::Failed) => {
                            let detail = status.error_detail();
                            tracing::warn!(%execution_id, attempt, %detail, "Execution reported failure");
                            self.emit_terminal(execution_id, &status);
                            return Err(WorkflowError::JobFailed {
                                execution_id: execution_id.to_string(),
                                detail,
                            });
                        }
                        Some(JobState::InProgress) => {
                            tracing::debug!(
                                %execution_id,
                                attempt,
                                max_attempts,
                                state = %status.raw_state,
                                "Execution still in progress"
                            );
                        }
                        None => {
                            tracing::warn!(
                                %execution_id,
                                attempt,
                                state = %status.raw_state,
                                "Unrecognized execution state, polling again"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(%execution_id, attempt, max_attempts, "Status check failed: {e}");
                    emit(
                        self.events,
                        RunEvent::TransientFailure {
                            execution_id: execution_id.to_string(),
                            attempt,
                            message: e.to_string(),
                        },
                    );
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled(execution_id)),
                    _ = tokio::time::sleep(self.settings.interval) => {}
                }
            }
        }

        tracing::warn!(%execution_id, max_attempts, "Polling budget exhausted");
        Err(WorkflowError::PollTimeout {
            execution_id: execution_id.to_string(),
            attempts: max_attempts,
            bound: self.settings.bound(),
        })
    }

    fn emit_terminal(&self, execution_id: &str, status: &JobStatus) {
        emit(
            self.events,
            RunEvent::Terminal {
                execution_id: execution_id.to_string(),
                state: status.raw_state.clone(),
            },
        );
    }
}

fn cancelled(execution_id: &str) -> WorkflowError {
    WorkflowError::Cancelled {
        execution_id: Some(execution_id.to_string()),
    }
}
