//! Scripted [`ExecutionBackend`] for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::client::ExecutionBackend;
use super::types::{JobHandle, JobSpec, JobStatus, NodeResult};
use crate::error::{LaunchError, TransientNetworkError};

pub(crate) fn status(body: Value) -> Result<JobStatus, TransientNetworkError> {
    Ok(JobStatus::from_snapshot(body).expect("test status body"))
}

pub(crate) fn running() -> Result<JobStatus, TransientNetworkError> {
    status(json!({"status": "RUNNING"}))
}

pub(crate) fn transient(msg: &str) -> Result<JobStatus, TransientNetworkError> {
    Err(TransientNetworkError(msg.to_string()))
}

/// Replays queued status responses; once the queue is empty every poll
/// reports RUNNING.
pub(crate) struct ScriptedBackend {
    launch_error: Mutex<Option<LaunchError>>,
    statuses: Mutex<VecDeque<Result<JobStatus, TransientNetworkError>>>,
    failing_steps: Vec<String>,
    status_calls: AtomicU32,
    step_calls: AtomicU32,
}

impl ScriptedBackend {
    pub fn new(statuses: Vec<Result<JobStatus, TransientNetworkError>>) -> Self {
        Self {
            launch_error: Mutex::new(None),
            statuses: Mutex::new(statuses.into()),
            failing_steps: Vec::new(),
            status_calls: AtomicU32::new(0),
            step_calls: AtomicU32::new(0),
        }
    }

    pub fn failing_launch(error: LaunchError) -> Self {
        let backend = Self::new(Vec::new());
        *backend.launch_error.lock().unwrap() = Some(error);
        backend
    }

    pub fn with_failing_steps(mut self, steps: &[&str]) -> Self {
        self.failing_steps = steps.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn step_calls(&self) -> u32 {
        self.step_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    async fn launch(&self, spec: &JobSpec) -> Result<JobHandle, LaunchError> {
        if let Some(err) = self.launch_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(JobHandle::new(
            format!("exec-{}", spec.bot_id),
            spec.token.clone().unwrap_or_else(|| "test-token".to_string()),
        ))
    }

    async fn fetch_status(&self, _handle: &JobHandle) -> Result<JobStatus, TransientNetworkError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        next.unwrap_or_else(running)
    }

    async fn fetch_step_result(&self, handle: &JobHandle, step: &str) -> NodeResult {
        self.step_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.failing_steps.iter().any(|s| s == step) {
            NodeResult::error(step, "HTTP 502 Bad Gateway")
        } else {
            NodeResult::payload(
                step,
                json!({"execution": handle.execution_id(), "step": step}),
            )
        }
    }
}

