// ABOUTME: Task data structures owned by a workflow
// ABOUTME: Defines stored tasks plus the payloads used to create and update them

use serde::{Deserialize, Serialize};

use crate::tasks::ConfigMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order: usize,
    #[serde(default)]
    pub config: ConfigMap,
}

/// A task before it is placed in a workflow. Id and order are assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub name: String,
    pub task_type: String,
    pub description: Option<String>,
    pub config: ConfigMap,
}

/// Partial update of a task. Identity and position are not updatable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub task_type: Option<String>,
    pub description: Option<String>,
    pub config: Option<ConfigMap>,
}

impl NewTask {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>, config: ConfigMap) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            description: None,
            config,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn into_task(self, order: usize) -> Task {
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            task_type: self.task_type,
            name: self.name,
            description: self.description,
            order,
            config: self.config,
        }
    }
}

impl TaskUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn config(mut self, config: ConfigMap) -> Self {
        self.config = Some(config);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Task {
    pub fn apply(&mut self, update: TaskUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(task_type) = update.task_type {
            self.task_type = task_type;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(config) = update.config {
            self.config = config;
        }
    }
}
