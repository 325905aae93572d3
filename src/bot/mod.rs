//! Remote bot-workflow execution.
//!
//! [`orchestrator::WorkflowOrchestrator`] is the entry point. It drives an
//! [`client::ExecutionBackend`] through launch, [`poller`] and
//! [`aggregator`], producing a [`types::ConsolidatedReport`].

pub mod aggregator;
pub mod client;
pub mod orchestrator;
pub mod poller;
pub mod run_log;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ExecutionBackend, HttpExecutionClient};
pub use orchestrator::WorkflowOrchestrator;
pub use poller::PollSettings;
pub use types::{ConsolidatedReport, JobHandle, JobSpec, JobState, JobStatus, NodeResult};
