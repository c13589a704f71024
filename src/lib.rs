// ABOUTME: Main library module for the taskflow workflow runner
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod engine;
pub mod tasks;
pub mod workflow;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use engine::{
    EngineConfig, ExecutionStore, Notifier, RunReport, TaskExecutor, TaskResult, WorkflowEngine,
};
pub use tasks::{ConfigMap, TaskHandler, TaskRegistry};
pub use workflow::{NewTask, Task, Workflow, WorkflowParser, WorkflowStore};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
