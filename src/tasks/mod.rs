// ABOUTME: Built-in task implementations and the open handler extension point
// ABOUTME: Contains the email, log and calculation tasks plus the task definition registry

pub mod calculation;
pub mod email;
pub mod log;
pub mod registry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::engine::error::TaskError;

pub use crate::engine::result::TaskResult;
pub use calculation::{CalculationConfig, Operation};
pub use email::EmailConfig;
pub use log::{LogConfig, LogLevel, LogSink, TracingLogSink};
pub use registry::{InputSpec, TaskDefinition, TaskRegistry, ValueKind};

/// Flat key to value mapping used for task configs and task outputs.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Handler for a task type outside the built-in set.
///
/// Handlers are registered on the `TaskRegistry`; the executor contains any
/// error or panic they produce.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn definition(&self) -> TaskDefinition;

    async fn execute(&self, config: &ConfigMap) -> Result<ConfigMap, TaskError>;

    /// Outputs reported alongside an error
    fn failure_outputs(&self) -> ConfigMap {
        ConfigMap::new()
    }
}

/// Typed configuration of a built-in task.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinTask {
    Email(EmailConfig),
    Log(LogConfig),
    Calculation(CalculationConfig),
}

impl BuiltinTask {
    /// Parse `config` for a built-in `task_type`. Returns `None` when the type
    /// is not built in.
    pub fn parse(task_type: &str, config: &ConfigMap) -> Option<Result<Self, TaskError>> {
        let parsed = match task_type {
            email::TASK_TYPE => from_config(task_type, config).map(BuiltinTask::Email),
            log::TASK_TYPE => from_config(task_type, config).map(BuiltinTask::Log),
            calculation::TASK_TYPE => {
                from_config(task_type, config).map(BuiltinTask::Calculation)
            }
            _ => return None,
        };
        Some(parsed)
    }

    pub fn is_builtin(task_type: &str) -> bool {
        matches!(
            task_type,
            email::TASK_TYPE | log::TASK_TYPE | calculation::TASK_TYPE
        )
    }

    /// Type-appropriate outputs that accompany a failure
    pub fn failure_outputs(task_type: &str) -> ConfigMap {
        match task_type {
            email::TASK_TYPE => email::failure_outputs(),
            log::TASK_TYPE => log::failure_outputs(),
            calculation::TASK_TYPE => calculation::failure_outputs(),
            _ => ConfigMap::new(),
        }
    }

    pub fn task_type(&self) -> &'static str {
        match self {
            BuiltinTask::Email(_) => email::TASK_TYPE,
            BuiltinTask::Log(_) => log::TASK_TYPE,
            BuiltinTask::Calculation(_) => calculation::TASK_TYPE,
        }
    }
}

fn from_config<T: DeserializeOwned>(task_type: &str, config: &ConfigMap) -> Result<T, TaskError> {
    serde_json::from_value(serde_json::Value::Object(config.clone()))
        .map_err(|e| TaskError::invalid_config(task_type, e))
}
