// ABOUTME: Core workflow data structure and YAML definition parsing
// ABOUTME: Keeps tasks sorted by a contiguous zero-based order across every mutation

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::debug;

use super::error::{Result, ValidationError, WorkflowError};
use super::task::{NewTask, Task, TaskUpdate};
use crate::tasks::ConfigMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub status: WorkflowStatus,
}

impl Workflow {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description,
            tasks: Vec::new(),
            status: WorkflowStatus::Idle,
        }
    }

    /// Append a task at the end of the sequence
    pub fn push_task(&mut self, task: NewTask) -> &Task {
        let order = self.tasks.len();
        self.tasks.push(task.into_task(order));
        &self.tasks[order]
    }

    pub fn remove_task(&mut self, task_id: &str) -> Option<Task> {
        let index = self.position(task_id)?;
        let removed = self.tasks.remove(index);
        self.renumber();
        Some(removed)
    }

    pub fn update_task(&mut self, task_id: &str, update: TaskUpdate) -> Option<&Task> {
        let index = self.position(task_id)?;
        self.tasks[index].apply(update);
        Some(&self.tasks[index])
    }

    /// Move a task to `new_order`, clamped to the valid range. Every other
    /// task keeps its relative order. Returns false for an unknown task.
    pub fn reorder_task(&mut self, task_id: &str, new_order: usize) -> bool {
        let Some(index) = self.position(task_id) else {
            return false;
        };

        let task = self.tasks.remove(index);
        let target = new_order.min(self.tasks.len());
        self.tasks.insert(target, task);
        self.renumber();
        true
    }

    pub fn get_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn has_task(&self, task_id: &str) -> bool {
        self.get_task(task_id).is_some()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }

    /// True when task orders are exactly 0..n in vector order
    pub fn has_contiguous_order(&self) -> bool {
        self.tasks.iter().enumerate().all(|(i, t)| t.order == i)
    }

    /// Sort by the stored order then close any gaps
    pub fn normalize_order(&mut self) {
        self.tasks.sort_by_key(|t| t.order);
        self.renumber();
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&WorkflowDefinition::from(self)).map_err(WorkflowError::YamlError)
    }

    fn position(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    fn renumber(&mut self) {
        for (order, task) in self.tasks.iter_mut().enumerate() {
            task.order = order;
        }
    }
}

/// On-disk workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkflowDefinition {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    tasks: Vec<TaskDefinitionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskDefinitionEntry {
    name: String,
    #[serde(rename = "type")]
    task_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order: Option<usize>,
    #[serde(default)]
    config: ConfigMap,
}

impl From<&Workflow> for WorkflowDefinition {
    fn from(workflow: &Workflow) -> Self {
        Self {
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            tasks: workflow
                .tasks
                .iter()
                .map(|task| TaskDefinitionEntry {
                    name: task.name.clone(),
                    task_type: task.task_type.clone(),
                    description: task.description.clone(),
                    order: Some(task.order),
                    config: task.config.clone(),
                })
                .collect(),
        }
    }
}

pub struct WorkflowParser;

impl WorkflowParser {
    /// Parse a workflow definition file
    pub async fn parse_file<P: AsRef<Path>>(path: P) -> Result<Workflow> {
        let content = fs::read_to_string(path.as_ref()).await?;
        debug!("Parsing workflow file {}", path.as_ref().display());
        Self::from_yaml(&content)
    }

    /// Parse a workflow definition from YAML text
    pub fn from_yaml(content: &str) -> Result<Workflow> {
        let definition: WorkflowDefinition = serde_yaml::from_str(content)?;

        if definition.name.trim().is_empty() {
            return Err(WorkflowError::MissingField("name".to_string()));
        }
        if definition.tasks.is_empty() {
            return Err(ValidationError::EmptyWorkflow.into());
        }

        let mut entries: Vec<(usize, TaskDefinitionEntry)> =
            definition.tasks.into_iter().enumerate().collect();
        for (index, entry) in &entries {
            if entry.name.trim().is_empty() {
                return Err(WorkflowError::MissingField(format!("tasks[{}].name", index)));
            }
            if entry.task_type.trim().is_empty() {
                return Err(WorkflowError::MissingField(format!("tasks[{}].type", index)));
            }
        }

        // explicit orders win, file position breaks ties
        entries.sort_by_key(|(index, entry)| (entry.order.unwrap_or(*index), *index));

        let mut workflow = Workflow::new(definition.name, definition.description);
        for (_, entry) in entries {
            let mut task = NewTask::new(entry.name, entry.task_type, entry.config);
            task.description = entry.description;
            workflow.push_task(task);
        }

        Ok(workflow)
    }
}
