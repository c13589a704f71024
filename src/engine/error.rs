// ABOUTME: Error types for the workflow execution engine and task handlers
// ABOUTME: Separates run-level precondition errors from task-level failures

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Workflow not found: {workflow_id}")]
    WorkflowNotFound { workflow_id: String },

    #[error("Workflow has no tasks: {workflow_id}")]
    EmptyWorkflow { workflow_id: String },

    #[error("A workflow run is already in progress: {run_id}")]
    AlreadyRunning { run_id: String },

    #[error("Workflow store error: {0}")]
    WorkflowError(#[from] crate::workflow::WorkflowError),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;

/// Failure raised inside a task handler. Never escapes the executor; it is
/// turned into an unsuccessful `TaskResult` whose `error` is this message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation")]
    InvalidOperation,

    #[error("Invalid {task_type} configuration: {message}")]
    InvalidConfig { task_type: String, message: String },

    #[error("Unknown task type")]
    UnknownTaskType,

    #[error("Failed to log message: {0}")]
    LogSink(String),

    #[error("Task timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Task handler panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    pub fn invalid_config(task_type: &str, message: impl std::fmt::Display) -> Self {
        TaskError::InvalidConfig {
            task_type: task_type.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_messages() {
        let errors = [
            ExecutionError::WorkflowNotFound {
                workflow_id: "wf".to_string(),
            },
            ExecutionError::EmptyWorkflow {
                workflow_id: "wf".to_string(),
            },
            ExecutionError::AlreadyRunning {
                run_id: "run".to_string(),
            },
            ExecutionError::WorkflowError(crate::workflow::WorkflowError::WorkflowNotFound(
                "wf".to_string(),
            )),
        ];
        for error in errors {
            let expected = match &error {
                ExecutionError::WorkflowNotFound { .. } => "Workflow not found: wf",
                ExecutionError::EmptyWorkflow { .. } => "Workflow has no tasks: wf",
                ExecutionError::AlreadyRunning { .. } => {
                    "A workflow run is already in progress: run"
                }
                ExecutionError::WorkflowError(_) => "Workflow store error: Workflow not found: wf",
            };
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_task_error_messages() {
        assert_eq!(TaskError::DivisionByZero.to_string(), "Division by zero");
        assert_eq!(TaskError::InvalidOperation.to_string(), "Invalid operation");
        assert_eq!(
            TaskError::invalid_config("calculation", "missing field `value1`").to_string(),
            "Invalid calculation configuration: missing field `value1`"
        );
    }
}
