// ABOUTME: Shared execution state store for workflow runs
// ABOUTME: Holds results, timings, logs and run records behind a watch channel for subscribers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::batch::BatchUpdate;
use super::result::TaskResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTiming {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub task_timings: HashMap<String, TaskTiming>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub run_id: String,
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionState {
    pub current_workflow_id: Option<String>,
    pub current_task_id: Option<String>,
    pub current_run_id: Option<String>,
    pub status: ExecutionStatus,
    pub task_results: HashMap<String, TaskResult>,
    pub task_execution_times: HashMap<String, u64>,
    pub logs: Vec<LogEntry>,
    pub runs: Vec<Run>,
}

/// Handle to one execution state instance. Clones share the same state.
///
/// At most one run should be active per store; concurrent runs would fight
/// over the current workflow/task pointers.
#[derive(Debug, Clone)]
pub struct ExecutionStore {
    state: Arc<watch::Sender<ExecutionState>>,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl Run {
    fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Running,
            task_timings: HashMap::new(),
            message: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    fn finish(&mut self, status: RunStatus, message: Option<String>) {
        self.status = status;
        self.end_time = Some(Utc::now());
        self.message = message;
    }
}

impl ExecutionState {
    pub fn get_run(&self, run_id: &str) -> Option<&Run> {
        self.runs.iter().find(|r| r.id == run_id)
    }

    pub fn logs_for_run(&self, run_id: &str) -> Vec<&LogEntry> {
        self.logs.iter().filter(|l| l.run_id == run_id).collect()
    }

    fn active_run_mut(&mut self, run_id: &str) -> Option<&mut Run> {
        self.runs
            .iter_mut()
            .find(|r| r.id == run_id && !r.is_finished())
    }
}

impl ExecutionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ExecutionState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn snapshot(&self) -> ExecutionState {
        self.state.borrow().clone()
    }

    /// Read from the current state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&ExecutionState) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
        self.state.subscribe()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.state.borrow().status
    }

    pub fn current_run_id(&self) -> Option<String> {
        self.state.borrow().current_run_id.clone()
    }

    pub fn set_current_workflow(&self, workflow_id: Option<String>) {
        self.state
            .send_modify(|state| state.current_workflow_id = workflow_id);
    }

    pub fn set_current_task(&self, task_id: Option<String>) {
        self.state.send_modify(|state| state.current_task_id = task_id);
    }

    pub fn set_status(&self, status: ExecutionStatus) {
        self.state.send_modify(|state| state.status = status);
    }

    pub fn add_task_result(&self, task_id: &str, result: TaskResult) {
        self.state.send_modify(|state| {
            state.task_results.insert(task_id.to_string(), result);
        });
    }

    pub fn add_log(&self, run_id: &str, task_id: &str, message: impl Into<String>, kind: LogKind) {
        let entry = LogEntry {
            run_id: run_id.to_string(),
            task_id: task_id.to_string(),
            timestamp: Utc::now(),
            message: message.into(),
            kind,
        };
        self.state.send_modify(|state| state.logs.push(entry));
    }

    /// Record a new running run and make it current
    pub fn start_run(&self) -> String {
        let run = Run::new();
        let run_id = run.id.clone();
        self.state.send_modify(|state| {
            state.current_run_id = Some(run.id.clone());
            state.runs.push(run);
        });
        debug!("Started run {}", run_id);
        run_id
    }

    /// Set the terminal status of a run. Returns false when the run is unknown
    /// or already finished; a finished run is never modified.
    pub fn end_run(&self, run_id: &str, status: RunStatus, message: Option<String>) -> bool {
        if !status.is_terminal() {
            warn!("Ignoring attempt to end run {} with a running status", run_id);
            return false;
        }

        self.state.send_if_modified(|state| match state.active_run_mut(run_id) {
            Some(run) => {
                run.finish(status, message);
                true
            }
            None => false,
        })
    }

    /// End a run and set the matching overall status in one transition, only
    /// if the run is still the current running one.
    pub fn finish_run(&self, run_id: &str, status: RunStatus) -> bool {
        let overall = match status {
            RunStatus::Running => return false,
            RunStatus::Completed => ExecutionStatus::Completed,
            RunStatus::Error => ExecutionStatus::Error,
        };

        self.state.send_if_modified(|state| {
            if state.current_run_id.as_deref() != Some(run_id) {
                return false;
            }
            match state.active_run_mut(run_id) {
                Some(run) => {
                    run.finish(status, None);
                    state.status = overall;
                    true
                }
                None => false,
            }
        })
    }

    /// Manually stop a running run: overall status goes back to idle and the
    /// run ends as an error with message "stopped".
    pub fn stop_run(&self, run_id: &str) -> bool {
        self.state.send_if_modified(|state| {
            if state.status != ExecutionStatus::Running {
                return false;
            }
            match state.active_run_mut(run_id) {
                Some(run) => {
                    run.finish(RunStatus::Error, Some("stopped".to_string()));
                    state.status = ExecutionStatus::Idle;
                    true
                }
                None => false,
            }
        })
    }

    pub fn start_task_execution(&self, run_id: &str, task_id: &str) {
        self.state.send_modify(|state| {
            if let Some(run) = state.active_run_mut(run_id) {
                run.task_timings.insert(
                    task_id.to_string(),
                    TaskTiming {
                        start: Utc::now(),
                        end: None,
                    },
                );
            }
        });
    }

    /// Close the timing pair of a task, returning its elapsed milliseconds
    pub fn end_task_execution(&self, run_id: &str, task_id: &str) -> Option<u64> {
        let mut elapsed = None;
        self.state.send_if_modified(|state| {
            let timing = state
                .active_run_mut(run_id)
                .and_then(|run| run.task_timings.get_mut(task_id));
            match timing {
                Some(timing) => {
                    let end = Utc::now();
                    timing.end = Some(end);
                    elapsed = Some((end - timing.start).num_milliseconds().max(0) as u64);
                    true
                }
                None => false,
            }
        });
        elapsed
    }

    /// Apply a batch of buffered updates as a single state transition
    pub fn apply_batch(&self, updates: &[BatchUpdate]) {
        if updates.is_empty() {
            return;
        }

        self.state.send_modify(|state| {
            for update in updates {
                if let Some(ref result) = update.result {
                    state
                        .task_results
                        .insert(update.task_id.clone(), result.clone());
                }
                if let Some(execution_time) = update.execution_time {
                    state
                        .task_execution_times
                        .insert(update.task_id.clone(), execution_time);
                }
                for line in &update.logs {
                    state.logs.push(LogEntry {
                        run_id: update.run_id.clone(),
                        task_id: update.task_id.clone(),
                        timestamp: update.created_at,
                        message: line.message.clone(),
                        kind: line.kind,
                    });
                }
            }
        });
    }

    /// Reset the per-run fields. Logs and run history are kept.
    pub fn clear_execution(&self) {
        self.state.send_modify(|state| {
            state.status = ExecutionStatus::Idle;
            state.current_task_id = None;
            state.task_results.clear();
            state.task_execution_times.clear();
        });
    }

    /// Wipe all execution state including logs and run history
    pub fn reset(&self) {
        self.state.send_replace(ExecutionState::default());
    }
}

impl Default for ExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}
