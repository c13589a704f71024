// ABOUTME: Error types for workflow definitions, the workflow store and validation
// ABOUTME: Defines store lookup failures, parse failures and per-task validation errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Failed to read workflow file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Task {task_id} not found in workflow {workflow_id}")]
    TaskNotFound {
        workflow_id: String,
        task_id: String,
    },

    #[error("Validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Empty workflow: no tasks defined")]
    EmptyWorkflow,

    #[error("Unsupported task type '{task_type}' in task '{task}'. Supported types: {supported_types:?}")]
    UnsupportedTaskType {
        task: String,
        task_type: String,
        supported_types: Vec<String>,
    },

    #[error("Invalid task configuration for '{task}': {reason}")]
    InvalidTaskConfig { task: String, reason: String },
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
