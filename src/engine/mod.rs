// ABOUTME: Workflow execution engine: task dispatch, batched state updates and run control
// ABOUTME: Runs a workflow's tasks in order with fail-fast semantics and manual stop

pub mod batch;
pub mod error;
pub mod executor;
pub mod notify;
pub mod result;
pub mod runner;
pub mod state;

pub use batch::{BatchAggregator, BatchConfig, BatchLog, BatchUpdate};
pub use error::{ExecutionError, Result, TaskError};
pub use executor::{TaskExecutor, DEFAULT_EMAIL_DELAY};
pub use notify::{
    ChannelNotifier, NoopNotifier, Notification, NotificationVariant, Notifier, TracingNotifier,
};
pub use result::{RunOutcome, RunReport, RunSummary, TaskReport, TaskResult, TaskStatus};
pub use runner::{EngineConfig, WorkflowEngine, SYSTEM_TASK_ID};
pub use state::{
    ExecutionState, ExecutionStatus, ExecutionStore, LogEntry, LogKind, Run, RunStatus, TaskTiming,
};
