//! Workflow orchestrator: the single entry point for running a bot workflow.
//!
//! Sequence: launch → poll until terminal → classify intermediate steps →
//! gather step results → [`ConsolidatedReport`]. The first failing stage
//! short-circuits the rest; a report is only ever returned whole.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::aggregator::{classify_intermediate_steps, gather_step_results};
use super::client::{ExecutionBackend, HttpExecutionClient};
use super::poller::{CompletionPoller, PollSettings};
use super::run_log::{EventSender, RunEvent, emit};
use super::types::{ConsolidatedReport, JobSpec, JobState};
use crate::config::AppConfig;
use crate::error::{ConfigError, WorkflowError};

/// Runs workflows against one execution backend.
///
/// Holds no per-run state: concurrent calls to [`run_workflow`] each own
/// their handle, snapshots and result map.
///
/// [`run_workflow`]: WorkflowOrchestrator::run_workflow
pub struct WorkflowOrchestrator {
    backend: Arc<dyn ExecutionBackend>,
    settings: PollSettings,
    events: Option<EventSender>,
}

impl WorkflowOrchestrator {
    pub fn new(backend: Arc<dyn ExecutionBackend>, settings: PollSettings) -> Self {
        Self {
            backend,
            settings,
            events: None,
        }
    }

    /// Build an orchestrator over [`HttpExecutionClient`] from resolved config.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let client = HttpExecutionClient::from_config(config)?;
        Ok(Self::new(Arc::new(client), config.poll_settings()))
    }

    /// Attach a run-event channel (see [`super::run_log::RunLogger::drain`]).
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Launch `spec`, wait for it to finish and collect its step results.
    pub async fn run_workflow(
        &self,
        spec: &JobSpec,
        cancel: &CancellationToken,
    ) -> Result<ConsolidatedReport, WorkflowError> {
        let outcome = self.execute(spec, cancel).await;

        if let Err(e) = &outcome {
            tracing::error!(bot_id = %spec.bot_id, "Workflow run failed: {e}");
            emit(
                self.events.as_ref(),
                RunEvent::Failed {
                    execution_id: e.execution_id().map(str::to_string),
                    message: e.to_string(),
                },
            );
        }

        outcome
    }

    async fn execute(
        &self,
        spec: &JobSpec,
        cancel: &CancellationToken,
    ) -> Result<ConsolidatedReport, WorkflowError> {
        let start = Instant::now();
        let started_at = Utc::now().to_rfc3339();

        let handle = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkflowError::Cancelled { execution_id: None }),
            launched = self.backend.launch(spec) => launched?,
        };
        let execution_id = handle.execution_id().to_string();
        emit(
            self.events.as_ref(),
            RunEvent::Launched {
                bot_id: spec.bot_id.clone(),
                execution_id: execution_id.clone(),
            },
        );

        let final_status = CompletionPoller::new(self.backend.as_ref(), self.settings)
            .with_events(self.events.as_ref())
            .wait_for_completion(&handle, cancel)
            .await?;

        let step_names = classify_intermediate_steps(final_status.results.as_ref());
        tracing::debug!(%execution_id, steps = step_names.len(), "Fetching intermediate step results");

        let steps = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(WorkflowError::Cancelled { execution_id: Some(execution_id) });
            }
            steps = gather_step_results(self.backend.as_ref(), &handle, &step_names) => steps,
        };

        for (step, result) in &steps {
            emit(
                self.events.as_ref(),
                RunEvent::StepFetched {
                    execution_id: execution_id.clone(),
                    step: step.clone(),
                    ok: !result.is_error(),
                },
            );
        }

        let elapsed_secs = start.elapsed().as_secs_f64();
        let report = ConsolidatedReport {
            success: final_status.state == Some(JobState::Succeeded),
            execution_id: execution_id.clone(),
            final_state: final_status.raw_state,
            steps,
            snapshot: final_status.snapshot,
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            elapsed_secs,
        };

        tracing::info!(
            %execution_id,
            success = report.success,
            steps = report.steps.len(),
            elapsed_secs,
            "Workflow run finished"
        );
        emit(
            self.events.as_ref(),
            RunEvent::Finished {
                execution_id,
                success: report.success,
                steps: report.steps.len(),
                elapsed_secs,
            },
        );

        Ok(report)
    }
}
