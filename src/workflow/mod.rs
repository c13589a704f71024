// ABOUTME: Workflow definitions: data model, YAML parsing, in-memory store and validation
// ABOUTME: Exports the types the engine runs and the CLI loads

pub mod error;
pub mod store;
pub mod task;
pub mod validation;
#[allow(clippy::module_inception)]
pub mod workflow;

pub use error::{Result, ValidationError, WorkflowError};
pub use store::{WorkflowState, WorkflowStore};
pub use task::{NewTask, Task, TaskUpdate};
pub use validation::{ValidationReport, WorkflowValidator};
pub use workflow::{Workflow, WorkflowParser, WorkflowStatus};
