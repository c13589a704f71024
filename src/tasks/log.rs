// ABOUTME: Log task implementation writing messages to an external log sink
// ABOUTME: Defines the LogSink port and its tracing-backed default

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::registry::{InputSpec, TaskDefinition, ValueKind};
use super::ConfigMap;
use crate::engine::error::TaskError;

pub const TASK_TYPE: &str = "log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Case-insensitive lookup; anything unrecognised logs at info
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(name.as_deref().map(LogLevel::from_name).unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    pub message: String,
    #[serde(default)]
    pub level: LogLevel,
}

/// Destination for messages written by log tasks.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: LogLevel, message: &str) -> Result<(), TaskError>;
}

/// Writes log task messages as tracing events under the `taskflow::task_log` target.
#[derive(Debug, Clone, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn emit(&self, level: LogLevel, message: &str) -> Result<(), TaskError> {
        match level {
            LogLevel::Info => info!(target: "taskflow::task_log", "{}", message),
            LogLevel::Warn => warn!(target: "taskflow::task_log", "{}", message),
            LogLevel::Error => error!(target: "taskflow::task_log", "{}", message),
        }
        Ok(())
    }
}

pub fn execute(config: &LogConfig, sink: &dyn LogSink) -> Result<ConfigMap, TaskError> {
    sink.emit(config.level, &config.message)?;

    let mut outputs = ConfigMap::new();
    outputs.insert("logged".to_string(), json!(true));
    Ok(outputs)
}

pub fn failure_outputs() -> ConfigMap {
    let mut outputs = ConfigMap::new();
    outputs.insert("logged".to_string(), json!(false));
    outputs
}

pub fn definition() -> TaskDefinition {
    let mut inputs = IndexMap::new();
    inputs.insert("message".to_string(), InputSpec::required(ValueKind::String));
    inputs.insert(
        "level".to_string(),
        InputSpec::required(ValueKind::String).with_default(json!("info")),
    );

    let mut outputs = IndexMap::new();
    outputs.insert("logged".to_string(), ValueKind::Boolean);

    TaskDefinition {
        task_type: TASK_TYPE.to_string(),
        name: "Log Message".to_string(),
        inputs,
        outputs,
        validator: Some(validate_config),
    }
}

fn validate_config(config: &ConfigMap) -> Result<(), String> {
    if config
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .is_empty()
    {
        return Err("message cannot be empty".to_string());
    }
    Ok(())
}
