// ABOUTME: Workflow validation against the task definition registry
// ABOUTME: Collects per-task schema errors and structural warnings into a report

use std::collections::HashSet;

use super::error::ValidationError;
use super::workflow::Workflow;
use crate::engine::error::TaskError;
use crate::tasks::TaskRegistry;

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
}

pub struct WorkflowValidator<'a> {
    registry: &'a TaskRegistry,
}

impl<'a> WorkflowValidator<'a> {
    pub fn new(registry: &'a TaskRegistry) -> Self {
        Self { registry }
    }

    /// Validate a complete workflow
    pub fn validate(&self, workflow: &Workflow) -> ValidationReport {
        let mut report = ValidationReport::new();

        if workflow.tasks.is_empty() {
            report.errors.push(ValidationError::EmptyWorkflow);
        }

        for task in &workflow.tasks {
            if let Err(error) = self.validate_task(&task.name, &task.task_type, &task.config) {
                report.errors.push(error);
            }
        }

        self.check_structure(workflow, &mut report);

        report.is_valid = report.errors.is_empty();
        report
    }

    fn validate_task(
        &self,
        task_name: &str,
        task_type: &str,
        config: &crate::tasks::ConfigMap,
    ) -> Result<(), ValidationError> {
        match self.registry.validate(task_type, config) {
            Ok(()) => Ok(()),
            Err(TaskError::UnknownTaskType) => Err(ValidationError::UnsupportedTaskType {
                task: task_name.to_string(),
                task_type: task_type.to_string(),
                supported_types: self
                    .registry
                    .list_supported_tasks()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            }),
            Err(e) => Err(ValidationError::InvalidTaskConfig {
                task: task_name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn check_structure(&self, workflow: &Workflow, report: &mut ValidationReport) {
        let mut names = HashSet::new();
        for task in &workflow.tasks {
            if !names.insert(task.name.as_str()) {
                report
                    .warnings
                    .push(format!("Task name '{}' is used more than once", task.name));
            }
        }

        if !workflow.has_contiguous_order() {
            report
                .warnings
                .push("Task order has gaps or duplicates; it will be renumbered".to_string());
        }
    }
}

impl TaskRegistry {
    /// Validate every task of `workflow` against this registry
    pub fn validate_workflow(&self, workflow: &Workflow) -> ValidationReport {
        WorkflowValidator::new(self).validate(workflow)
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{NewTask, WorkflowParser};
    use serde_json::json;

    #[test]
    fn test_valid_workflow() {
        let yaml = r#"
name: ok
tasks:
  - name: say
    type: log
    config: { message: "hello" }
  - name: sum
    type: calculation
    config: { value1: 1, value2: 2 }
"#;
        let workflow = WorkflowParser::from_yaml(yaml).unwrap();
        let report = TaskRegistry::new().validate_workflow(&workflow);
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_unsupported_and_invalid_tasks() {
        let mut workflow = Workflow::new("bad", None);
        workflow.push_task(NewTask::new(
            "text",
            "sms",
            json!({"to": "+15550100"}).as_object().cloned().unwrap(),
        ));
        workflow.push_task(NewTask::new(
            "mail",
            "email",
            json!({"to": "nobody", "subject": "s", "body": "b"})
                .as_object()
                .cloned()
                .unwrap(),
        ));

        let report = TaskRegistry::new().validate_workflow(&workflow);
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(
            report.errors[0],
            ValidationError::UnsupportedTaskType { ref task_type, .. } if task_type == "sms"
        ));
        assert!(matches!(
            report.errors[1],
            ValidationError::InvalidTaskConfig { ref task, .. } if task == "mail"
        ));
    }

    #[test]
    fn test_duplicate_names_warn() {
        let mut workflow = Workflow::new("dupes", None);
        for _ in 0..2 {
            workflow.push_task(NewTask::new(
                "same",
                "log",
                json!({"message": "m"}).as_object().cloned().unwrap(),
            ));
        }

        let report = TaskRegistry::new().validate_workflow(&workflow);
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_empty_workflow_is_invalid() {
        let report = TaskRegistry::new().validate_workflow(&Workflow::new("empty", None));
        assert_eq!(report.errors, vec![ValidationError::EmptyWorkflow]);
    }
}
