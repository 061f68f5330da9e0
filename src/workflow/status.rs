//! Run status persistence.
//!
//! The status record is the run's durability artifact: it is rewritten in
//! full after every step transition, so a reader can always tell exactly
//! which step was in flight if the process died mid-run.

use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::core::{Result, RunContext};
use crate::workflow::manifest::write_atomic;

/// File name of the per-run status record.
pub const STATUS_FILE: &str = "status.json";

/// Lifecycle of a run or of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Started,
    Done,
    Failed,
}

/// Progress record for a single step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Position in the workflow, starting at zero
    pub index: usize,

    /// Step display name
    pub name: String,

    /// Wall-clock start time, RFC 3339
    pub started_at: String,

    /// Current state
    pub status: RunState,

    /// Elapsed milliseconds, present once the step finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Log file path relative to the run directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
}

/// Full status of a workflow run, serialized to `status.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    /// Timestamp component of the run directory
    pub date: String,

    /// Overall state
    pub status: RunState,

    /// Total elapsed milliseconds, present once the run ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Snapshot of the run context at the last persist
    pub context: RunContext,

    /// Per-step progress, appended in execution order
    pub steps: Vec<StepRecord>,
}

impl RunStatus {
    /// Create a fresh record for a run that just started.
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            date: ctx.date.clone(),
            status: RunState::Started,
            duration_ms: None,
            context: ctx.clone(),
            steps: Vec::new(),
        }
    }

    /// Append a new step entry in the started state.
    pub fn begin_step(&mut self, index: usize, name: impl Into<String>) {
        self.steps.push(StepRecord {
            index,
            name: name.into(),
            started_at: Local::now().to_rfc3339(),
            status: RunState::Started,
            duration_ms: None,
            log_path: None,
        });
    }

    /// Mark the most recent step as done.
    pub fn finish_step(&mut self, duration_ms: u64, log_path: Option<String>) {
        if let Some(step) = self.steps.last_mut() {
            step.status = RunState::Done;
            step.duration_ms = Some(duration_ms);
            step.log_path = log_path;
        }
    }

    /// Mark the most recent step, and the run as a whole, as failed.
    pub fn fail_step(&mut self, duration_ms: u64, log_path: Option<String>) {
        if let Some(step) = self.steps.last_mut() {
            step.status = RunState::Failed;
            step.duration_ms = Some(duration_ms);
            step.log_path = log_path;
        }
        self.status = RunState::Failed;
    }

    /// Mark the whole run as completed.
    pub fn finish(&mut self, duration_ms: u64) {
        self.status = RunState::Done;
        self.duration_ms = Some(duration_ms);
    }

    /// Refresh the context snapshot before persisting.
    pub fn snapshot_context(&mut self, ctx: &RunContext) {
        self.context = ctx.clone();
    }

    /// Write the record to `status.json` under `run_dir`, replacing any
    /// previous version in full.
    pub fn save(&self, run_dir: &Path) -> Result<()> {
        let mut rendered = serde_json::to_string_pretty(self)?;
        rendered.push('\n');
        write_atomic(&run_dir.join(STATUS_FILE), rendered.as_bytes())?;
        Ok(())
    }

    /// Read a previously persisted record back from `run_dir`.
    pub fn load(run_dir: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(run_dir.join(STATUS_FILE))?;
        Ok(serde_json::from_str(&text)?)
    }
}
