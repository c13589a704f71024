// ABOUTME: Task result envelope and run report aggregation
// ABOUTME: Defines the uniform per-task result and the summary returned for a whole run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::tasks::ConfigMap;
use crate::workflow::{Task, Workflow};

/// Uniform result of one task execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    pub success: bool,
    #[serde(default)]
    pub outputs: ConfigMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failed,
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed { task_id: String, error: String },
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: String,
    pub name: String,
    pub task_type: String,
    pub order: usize,
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
    pub execution_time_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub workflow_id: String,
    pub workflow_name: String,
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub outcome: RunOutcome,
    pub tasks: Vec<TaskReport>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub skipped_tasks: usize,
    pub cancelled_tasks: usize,
    pub success_rate: f64,
}

impl TaskResult {
    pub fn success(outputs: ConfigMap) -> Self {
        Self {
            success: true,
            outputs,
            error: None,
        }
    }

    pub fn failure(outputs: ConfigMap, error: impl Into<String>) -> Self {
        Self {
            success: false,
            outputs,
            error: Some(error.into()),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.success
    }

    pub fn output(&self, key: &str) -> Option<&serde_json::Value> {
        self.outputs.get(key)
    }

    /// Error text for log lines, falling back when a handler gave none
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("Unknown error")
    }
}

impl TaskReport {
    pub fn new(task: &Task, status: TaskStatus) -> Self {
        Self {
            task_id: task.id.clone(),
            name: task.name.clone(),
            task_type: task.task_type.clone(),
            order: task.order,
            status,
            result: None,
            execution_time_ms: None,
        }
    }

    pub fn with_result(mut self, result: TaskResult, execution_time_ms: u64) -> Self {
        self.result = Some(result);
        self.execution_time_ms = Some(execution_time_ms);
        self
    }
}

impl RunReport {
    pub fn new(workflow: &Workflow, run_id: String) -> Self {
        Self {
            workflow_id: workflow.id.clone(),
            workflow_name: workflow.name.clone(),
            run_id,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            outcome: RunOutcome::Completed,
            tasks: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    pub fn add_task_report(&mut self, report: TaskReport) {
        self.tasks.push(report);
    }

    /// Fill in every task that never produced a report with `status`
    pub fn mark_remaining(&mut self, tasks: &[Task], status: TaskStatus) {
        for task in tasks {
            if self.get_task_report(&task.id).is_none() {
                self.tasks.push(TaskReport::new(task, status.clone()));
            }
        }
    }

    pub fn mark_finished(&mut self, outcome: RunOutcome) {
        let now = Utc::now();
        self.end_time = Some(now);
        self.duration = Some((now - self.start_time).to_std().unwrap_or(Duration::ZERO));
        self.outcome = outcome;
        self.tasks.sort_by_key(|t| t.order);
        self.update_summary();
    }

    pub fn get_task_report(&self, task_id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn get_task_result(&self, task_id: &str) -> Option<&TaskResult> {
        self.get_task_report(task_id).and_then(|t| t.result.as_ref())
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    fn update_summary(&mut self) {
        let count = |status: TaskStatus| self.tasks.iter().filter(|t| t.status == status).count();

        let total = self.tasks.len();
        let successful = count(TaskStatus::Success);
        let success_rate = if total > 0 {
            (successful as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        self.summary = RunSummary {
            total_tasks: total,
            successful_tasks: successful,
            failed_tasks: count(TaskStatus::Failed),
            skipped_tasks: count(TaskStatus::Skipped),
            cancelled_tasks: count(TaskStatus::Cancelled),
            success_rate,
        };
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped => write!(f, "skipped"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Failed { task_id, error } => {
                write!(f, "failed at task {}: {}", task_id, error)
            }
            RunOutcome::Stopped => write!(f, "stopped"),
        }
    }
}
