// ABOUTME: Workflow run controller driving sequential fail-fast execution of a workflow
// ABOUTME: Owns the run lifecycle, manual stop and the hand-off of events to the batch aggregator

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::batch::{BatchAggregator, BatchConfig, BatchUpdate};
use super::error::{ExecutionError, Result, TaskError};
use super::executor::TaskExecutor;
use super::notify::{Notification, Notifier};
use super::result::{RunOutcome, RunReport, TaskReport, TaskResult, TaskStatus};
use super::state::{ExecutionStatus, ExecutionStore, LogKind, RunStatus};
use crate::workflow::{Task, Workflow, WorkflowStatus, WorkflowStore};

/// Task id used for log lines that belong to the run rather than a task
pub const SYSTEM_TASK_ID: &str = "system";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default, with = "humantime_serde")]
    pub task_timeout: Option<Duration>,
}

struct ActiveRun {
    run_id: String,
    cancel: CancellationToken,
}

/// Clears the active run slot when a run returns or its future is dropped
struct ActiveRunGuard<'a> {
    slot: &'a Mutex<Option<ActiveRun>>,
    run_id: String,
}

pub struct WorkflowEngine {
    executor: Arc<TaskExecutor>,
    store: ExecutionStore,
    batch: BatchAggregator,
    config: EngineConfig,
    active: Mutex<Option<ActiveRun>>,
}

impl WorkflowEngine {
    /// Create a new engine recording into `store`
    pub fn new(executor: TaskExecutor, store: ExecutionStore, config: EngineConfig) -> Self {
        let batch = BatchAggregator::new(store.clone(), config.batch.clone());
        Self {
            executor: Arc::new(executor),
            store,
            batch,
            config,
            active: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &ExecutionStore {
        &self.store
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Run a workflow held in `workflows`, mirroring the run status onto it
    pub async fn run(&self, workflows: &WorkflowStore, workflow_id: &str) -> Result<RunReport> {
        let workflow = workflows
            .get(workflow_id)
            .ok_or_else(|| ExecutionError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            })?;
        self.execute(&workflow, Some(workflows)).await
    }

    /// Run a workflow that is not held in a workflow store
    pub async fn execute_workflow(&self, workflow: &Workflow) -> Result<RunReport> {
        self.execute(workflow, None).await
    }

    /// Stop the active run. The in-flight task is left to finish on its own
    /// and its result is discarded. Returns false when nothing was running.
    pub fn stop(&self) -> bool {
        let active = self.active.lock();
        let Some(ref run) = *active else {
            return false;
        };

        if !self.store.stop_run(&run.run_id) {
            return false;
        }
        run.cancel.cancel();

        self.batch.add_update(
            BatchUpdate::new(&run.run_id, SYSTEM_TASK_ID)
                .with_log("Workflow execution stopped", LogKind::Info),
        );
        info!("Workflow run {} stopped", run.run_id);
        self.notifier().notify(Notification::new(
            "Workflow Stopped",
            "Execution was manually stopped",
        ));
        true
    }

    fn notifier(&self) -> &dyn Notifier {
        self.executor.notifier().as_ref()
    }

    #[instrument(skip(self, workflow, mirror), fields(workflow_id = %workflow.id, workflow_name = %workflow.name))]
    async fn execute(&self, workflow: &Workflow, mirror: Option<&WorkflowStore>) -> Result<RunReport> {
        if workflow.tasks.is_empty() {
            return Err(ExecutionError::EmptyWorkflow {
                workflow_id: workflow.id.clone(),
            });
        }

        let cancel = CancellationToken::new();
        let run_id = self.begin_run(cancel.clone())?;
        let _guard = ActiveRunGuard {
            slot: &self.active,
            run_id: run_id.clone(),
        };

        self.store.set_current_workflow(Some(workflow.id.clone()));
        self.store.set_status(ExecutionStatus::Running);
        mirror_status(mirror, &workflow.id, WorkflowStatus::Running);

        info!("Starting workflow execution: {} (run_id: {})", workflow.name, run_id);
        self.batch.add_update(BatchUpdate::new(&run_id, SYSTEM_TASK_ID).with_log(
            format!("Starting workflow execution (Timestamp: {})", Utc::now().to_rfc3339()),
            LogKind::Info,
        ));
        self.notifier().notify(Notification::new(
            "Workflow Started",
            format!("Executing {}", workflow.name),
        ));

        let mut tasks = workflow.tasks.clone();
        tasks.sort_by_key(|t| t.order);

        let mut report = RunReport::new(workflow, run_id.clone());
        let outcome = self.run_tasks(&run_id, &tasks, &cancel, &mut report).await;

        match outcome {
            RunOutcome::Completed => {
                if self.store.finish_run(&run_id, RunStatus::Completed) {
                    self.batch.add_update(
                        BatchUpdate::new(&run_id, SYSTEM_TASK_ID).with_log(
                            format!(
                                "Workflow execution completed (Timestamp: {})",
                                Utc::now().to_rfc3339()
                            ),
                            LogKind::Success,
                        ),
                    );
                    info!("Workflow {} completed", workflow.name);
                    self.notifier().notify(Notification::new(
                        "Workflow Completed",
                        format!("Successfully executed {}", workflow.name),
                    ));
                    report.mark_finished(RunOutcome::Completed);
                } else {
                    // stopped between the last task and completion
                    report.mark_finished(RunOutcome::Stopped);
                }
            }
            RunOutcome::Failed { ref task_id, ref error } => {
                if self.store.finish_run(&run_id, RunStatus::Error) {
                    report.mark_remaining(&tasks, TaskStatus::Skipped);
                    let name = tasks
                        .iter()
                        .find(|t| &t.id == task_id)
                        .map(|t| t.name.as_str())
                        .unwrap_or(task_id.as_str());
                    error!("Workflow {} failed at task {}: {}", workflow.name, name, error);
                    self.notifier().notify(Notification::destructive(
                        "Workflow Failed",
                        format!("Failed at task: {}\n{}", name, error),
                    ));
                    report.mark_finished(outcome.clone());
                } else {
                    // stopped between the failing task and the end of the run
                    report.mark_remaining(&tasks, TaskStatus::Cancelled);
                    report.mark_finished(RunOutcome::Stopped);
                }
            }
            RunOutcome::Stopped => {
                report.mark_remaining(&tasks, TaskStatus::Cancelled);
                report.mark_finished(RunOutcome::Stopped);
            }
        }

        self.store.set_current_task(None);
        self.batch.flush();

        let final_status = match report.outcome {
            RunOutcome::Completed => WorkflowStatus::Completed,
            RunOutcome::Failed { .. } => WorkflowStatus::Error,
            RunOutcome::Stopped => WorkflowStatus::Idle,
        };
        mirror_status(mirror, &workflow.id, final_status);

        Ok(report)
    }

    fn begin_run(&self, cancel: CancellationToken) -> Result<String> {
        let mut active = self.active.lock();
        if let Some(ref run) = *active {
            return Err(ExecutionError::AlreadyRunning {
                run_id: run.run_id.clone(),
            });
        }

        self.store.clear_execution();
        let run_id = self.store.start_run();
        *active = Some(ActiveRun {
            run_id: run_id.clone(),
            cancel,
        });
        Ok(run_id)
    }

    /// Execute tasks in order until one fails or the run is stopped
    async fn run_tasks(
        &self,
        run_id: &str,
        tasks: &[Task],
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> RunOutcome {
        for task in tasks {
            if cancel.is_cancelled() {
                return RunOutcome::Stopped;
            }

            self.store.set_current_task(Some(task.id.clone()));
            self.store.start_task_execution(run_id, &task.id);
            let started = Instant::now();

            let short_id: String = task.id.chars().take(8).collect();
            info!("Executing task: {} ({})", task.name, task.task_type);
            self.batch.add_update(BatchUpdate::new(run_id, &task.id).with_log(
                format!("Executing task: {} (Task Id: {})", task.name, short_id),
                LogKind::Info,
            ));

            let Some(result) = self.execute_detached(task, cancel).await else {
                warn!("Task {} abandoned after stop", task.name);
                return RunOutcome::Stopped;
            };

            // a stop that lands while the result is being recorded still wins
            if cancel.is_cancelled() {
                return RunOutcome::Stopped;
            }

            let elapsed = self
                .store
                .end_task_execution(run_id, &task.id)
                .unwrap_or_else(|| started.elapsed().as_millis() as u64);

            let (status, log_line, kind) = if result.success {
                (
                    TaskStatus::Success,
                    "Task completed successfully".to_string(),
                    LogKind::Success,
                )
            } else {
                (
                    TaskStatus::Failed,
                    format!("Task failed: {}", result.error_message()),
                    LogKind::Error,
                )
            };

            self.batch.add_update(
                BatchUpdate::new(run_id, &task.id)
                    .with_result(result.clone(), elapsed)
                    .with_log(log_line, kind),
            );
            report.add_task_report(TaskReport::new(task, status).with_result(result.clone(), elapsed));

            if !result.success {
                return RunOutcome::Failed {
                    task_id: task.id.clone(),
                    error: result.error_message().to_string(),
                };
            }
        }

        RunOutcome::Completed
    }

    /// Run the executor call as its own tokio task and wait for it or the stop
    /// signal. Returns `None` when stopped first.
    async fn execute_detached(&self, task: &Task, cancel: &CancellationToken) -> Option<TaskResult> {
        let executor = Arc::clone(&self.executor);
        let task_type = task.task_type.clone();
        let config = task.config.clone();
        let timeout = self.config.task_timeout;

        let handle = tokio::spawn(async move {
            let execution = executor.execute_task(&task_type, &config);
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, execution).await {
                    Ok(result) => result,
                    Err(_) => TaskResult::failure(
                        executor.failure_outputs(&task_type),
                        TaskError::Timeout { timeout: limit }.to_string(),
                    ),
                },
                None => execution.await,
            }
        });

        tokio::select! {
            _ = cancel.cancelled() => None,
            joined = handle => Some(match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("Task {} did not run to completion: {}", task.name, e);
                    TaskResult::failure(
                        self.executor.failure_outputs(&task.task_type),
                        TaskError::Panicked(e.to_string()).to_string(),
                    )
                }
            }),
        }
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for ActiveRunGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.slot.lock();
        if active.as_ref().is_some_and(|run| run.run_id == self.run_id) {
            *active = None;
        }
    }
}

fn mirror_status(mirror: Option<&WorkflowStore>, workflow_id: &str, status: WorkflowStatus) {
    if let Some(workflows) = mirror {
        if let Err(e) = workflows.set_status(workflow_id, status) {
            warn!("Could not update status of workflow {}: {}", workflow_id, e);
        }
    }
}
