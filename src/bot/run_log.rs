//! JSONL run log for workflow orchestration.
//!
//! The orchestrator emits [`RunEvent`]s on an unbounded channel; a
//! [`RunLogger`] drains that channel into `{run_log_dir}/run-{timestamp}.jsonl`,
//! one timestamped JSON object per line.
//!
//! Uses synchronous `std::fs` since writes are small, buffered, and flushed
//! after each event.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Sender half handed to the orchestrator.
pub type EventSender = UnboundedSender<RunEvent>;

/// Returns the current UTC time as an ISO 8601 string with milliseconds.
fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Something that happened during a workflow run.
///
/// Tagged with `event_type` so each log line is self-describing.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RunEvent {
    Launched {
        bot_id: String,
        execution_id: String,
    },

    /// A status check that got an answer.
    PollAttempt {
        execution_id: String,
        attempt: u32,
        max_attempts: u32,
        state: String,
    },

    /// A status check that hit a network-layer failure.
    TransientFailure {
        execution_id: String,
        attempt: u32,
        message: String,
    },

    Terminal {
        execution_id: String,
        state: String,
    },

    StepFetched {
        execution_id: String,
        step: String,
        ok: bool,
    },

    Finished {
        execution_id: String,
        success: bool,
        steps: usize,
        elapsed_secs: f64,
    },

    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        execution_id: Option<String>,
        message: String,
    },
}

/// Send an event if a sink is attached. A closed receiver is ignored.
pub(crate) fn emit(events: Option<&EventSender>, event: RunEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

#[derive(Serialize)]
struct LogLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a RunEvent,
}

/// Append-only JSONL logger for workflow runs.
pub struct RunLogger {
    writer: BufWriter<fs::File>,
    log_path: PathBuf,
}

impl RunLogger {
    /// Create `log_dir` if needed and open a fresh `run-{timestamp}.jsonl` in it.
    pub fn new(log_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let run_id = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3f").to_string();
        let log_path = log_dir.join(format!("run-{run_id}.jsonl"));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            log_path,
        })
    }

    /// Serialize an event as a single JSON line and flush.
    pub fn log_event(&mut self, event: &RunEvent) -> anyhow::Result<()> {
        let line = LogLine {
            timestamp: now_iso(),
            event,
        };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Write every event from `rx` until all senders are dropped.
    pub async fn drain(mut self, mut rx: UnboundedReceiver<RunEvent>) {
        while let Some(event) = rx.recv().await {
            if let Err(e) = self.log_event(&event) {
                tracing::warn!(path = %self.log_path.display(), "Run log write failed: {e:#}");
            }
        }
    }
}
