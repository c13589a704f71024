// ABOUTME: Task definition registry mapping task types to schemas and handlers
// ABOUTME: Drives config validation, default filling and dispatch of custom task types

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{calculation, email, log, BuiltinTask, ConfigMap, TaskHandler};
use crate::engine::error::TaskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub kind: ValueKind,
    pub required: bool,
    pub default: Option<Value>,
}

/// Schema and optional semantic validator for one task type.
#[derive(Clone)]
pub struct TaskDefinition {
    pub task_type: String,
    pub name: String,
    pub inputs: IndexMap<String, InputSpec>,
    pub outputs: IndexMap<String, ValueKind>,
    pub validator: Option<fn(&ConfigMap) -> Result<(), String>>,
}

pub struct TaskRegistry {
    definitions: IndexMap<String, TaskDefinition>,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl ValueKind {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::String => write!(f, "string"),
            ValueKind::Number => write!(f, "number"),
            ValueKind::Boolean => write!(f, "boolean"),
        }
    }
}

impl InputSpec {
    pub fn required(kind: ValueKind) -> Self {
        Self {
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(kind: ValueKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("task_type", &self.task_type)
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl TaskRegistry {
    /// Registry holding the built-in email, log and calculation definitions
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_definition(email::definition());
        registry.register_definition(log::definition());
        registry.register_definition(calculation::definition());
        registry
    }

    pub fn empty() -> Self {
        Self {
            definitions: IndexMap::new(),
            handlers: HashMap::new(),
        }
    }

    pub fn register_definition(&mut self, definition: TaskDefinition) {
        debug!("Registering task definition: {}", definition.task_type);
        self.definitions
            .insert(definition.task_type.clone(), definition);
    }

    /// Remove a task type along with any handler registered for it
    pub fn remove_definition(&mut self, task_type: &str) -> Option<TaskDefinition> {
        self.handlers.remove(task_type);
        self.definitions.shift_remove(task_type)
    }

    /// Register a handler for a custom task type. Built-in types always
    /// dispatch to their own implementation.
    pub fn register_handler(&mut self, handler: Arc<dyn TaskHandler>) {
        let definition = handler.definition();
        if BuiltinTask::is_builtin(&definition.task_type) {
            warn!(
                "Handler for built-in task type '{}' will not be used for dispatch",
                definition.task_type
            );
        }
        self.handlers
            .insert(definition.task_type.clone(), Arc::clone(&handler));
        self.register_definition(definition);
    }

    pub fn get(&self, task_type: &str) -> Option<&TaskDefinition> {
        self.definitions.get(task_type)
    }

    pub fn handler(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.definitions.values()
    }

    pub fn list_supported_tasks(&self) -> Vec<&str> {
        self.definitions.keys().map(|k| k.as_str()).collect()
    }

    /// Copy of `config` with schema defaults filled in for absent inputs
    pub fn apply_defaults(&self, task_type: &str, config: &ConfigMap) -> ConfigMap {
        let mut resolved = config.clone();
        if let Some(definition) = self.get(task_type) {
            for (input, spec) in &definition.inputs {
                if let Some(ref default) = spec.default {
                    let missing = resolved.get(input).map_or(true, Value::is_null);
                    if missing {
                        resolved.insert(input.clone(), default.clone());
                    }
                }
            }
        }
        resolved
    }

    /// Check `config` against the schema and validator of `task_type`
    pub fn validate(&self, task_type: &str, config: &ConfigMap) -> Result<(), TaskError> {
        let definition = self.get(task_type).ok_or(TaskError::UnknownTaskType)?;
        let config = self.apply_defaults(task_type, config);

        for (input, spec) in &definition.inputs {
            match config.get(input) {
                None | Some(Value::Null) => {
                    if spec.required {
                        return Err(TaskError::invalid_config(
                            task_type,
                            format!("missing required input '{}'", input),
                        ));
                    }
                }
                Some(value) if !spec.kind.matches(value) => {
                    return Err(TaskError::invalid_config(
                        task_type,
                        format!("input '{}' must be a {}", input, spec.kind),
                    ));
                }
                Some(_) => {}
            }
        }

        if let Some(validator) = definition.validator {
            validator(&config).map_err(|reason| TaskError::invalid_config(task_type, reason))?;
        }

        Ok(())
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
