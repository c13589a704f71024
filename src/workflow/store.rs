// ABOUTME: In-memory workflow store shared between the builder side and the engine
// ABOUTME: Applies workflow and task mutations atomically and notifies subscribers

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use super::error::{Result, WorkflowError};
use super::task::{NewTask, Task, TaskUpdate};
use super::workflow::{Workflow, WorkflowStatus};

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowState {
    pub workflows: Vec<Workflow>,
}

/// Handle to a set of workflows. Clones share the same state.
#[derive(Debug, Clone)]
pub struct WorkflowStore {
    state: Arc<watch::Sender<WorkflowState>>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(WorkflowState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    pub fn list(&self) -> Vec<Workflow> {
        self.state.borrow().workflows.clone()
    }

    pub fn get(&self, workflow_id: &str) -> Option<Workflow> {
        self.state
            .borrow()
            .workflows
            .iter()
            .find(|w| w.id == workflow_id)
            .cloned()
    }

    /// Create an empty idle workflow and return it as stored
    pub fn add_workflow(&self, name: impl Into<String>, description: Option<String>) -> Workflow {
        self.insert(Workflow::new(name, description))
    }

    /// Store a fully built workflow, replacing any workflow with the same id
    pub fn insert(&self, mut workflow: Workflow) -> Workflow {
        workflow.normalize_order();
        let stored = workflow.clone();
        self.state.send_modify(|state| {
            match state.workflows.iter_mut().find(|w| w.id == workflow.id) {
                Some(existing) => *existing = workflow,
                None => state.workflows.push(workflow),
            }
        });
        debug!("Stored workflow {} ({})", stored.name, stored.id);
        stored
    }

    pub fn remove_workflow(&self, workflow_id: &str) -> Result<Workflow> {
        let mut removed = None;
        self.state.send_if_modified(|state| {
            match state.workflows.iter().position(|w| w.id == workflow_id) {
                Some(index) => {
                    removed = Some(state.workflows.remove(index));
                    true
                }
                None => false,
            }
        });
        removed.ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.to_string()))
    }

    /// Append a task to a workflow; its order is the current task count
    pub fn add_task(&self, workflow_id: &str, task: NewTask) -> Result<Task> {
        self.modify(workflow_id, |workflow| Ok(workflow.push_task(task).clone()))
    }

    pub fn remove_task(&self, workflow_id: &str, task_id: &str) -> Result<Task> {
        self.modify(workflow_id, |workflow| {
            workflow
                .remove_task(task_id)
                .ok_or_else(|| task_not_found(workflow_id, task_id))
        })
    }

    pub fn update_task(&self, workflow_id: &str, task_id: &str, update: TaskUpdate) -> Result<Task> {
        self.modify(workflow_id, |workflow| {
            workflow
                .update_task(task_id, update)
                .cloned()
                .ok_or_else(|| task_not_found(workflow_id, task_id))
        })
    }

    pub fn reorder_tasks(&self, workflow_id: &str, task_id: &str, new_order: usize) -> Result<()> {
        self.modify(workflow_id, |workflow| {
            if workflow.reorder_task(task_id, new_order) {
                Ok(())
            } else {
                Err(task_not_found(workflow_id, task_id))
            }
        })
    }

    pub fn set_status(&self, workflow_id: &str, status: WorkflowStatus) -> Result<()> {
        self.modify(workflow_id, |workflow| {
            workflow.status = status;
            Ok(())
        })
    }

    /// Apply `f` to one workflow as a single transition. Subscribers are only
    /// notified when `f` succeeds.
    fn modify<R>(
        &self,
        workflow_id: &str,
        f: impl FnOnce(&mut Workflow) -> Result<R>,
    ) -> Result<R> {
        let mut outcome = Err(WorkflowError::WorkflowNotFound(workflow_id.to_string()));
        self.state.send_if_modified(|state| {
            match state.workflows.iter_mut().find(|w| w.id == workflow_id) {
                Some(workflow) => {
                    outcome = f(workflow);
                    outcome.is_ok()
                }
                None => false,
            }
        });
        outcome
    }
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

fn task_not_found(workflow_id: &str, task_id: &str) -> WorkflowError {
    WorkflowError::TaskNotFound {
        workflow_id: workflow_id.to_string(),
        task_id: task_id.to_string(),
    }
}
