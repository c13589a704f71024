// ABOUTME: Command implementations for the taskflow CLI
// ABOUTME: Handles execution of run, validate, init and tasks commands

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::Config;
use crate::engine::{
    ExecutionStore, LogKind, RunReport, TaskExecutor, TracingNotifier, WorkflowEngine,
};
use crate::tasks::TaskRegistry;
use crate::workflow::{ValidationReport, Workflow, WorkflowParser, WorkflowStore};

/// Execute a workflow command
pub async fn run_workflow(
    workflow_path: PathBuf,
    output: Option<PathBuf>,
    no_validate: bool,
    config: &Config,
) -> Result<()> {
    info!("Starting workflow execution: {}", workflow_path.display());

    let workflow = load_workflow(&workflow_path).await?;
    let registry = Arc::new(TaskRegistry::new());

    if no_validate {
        warn!("Skipping validation of workflow '{}'", workflow.name);
    } else {
        ensure_valid(&workflow, &registry.validate_workflow(&workflow))?;
    }

    let executor = TaskExecutor::new(registry, Arc::new(TracingNotifier))
        .with_email_delay(config.engine.email_delay);
    let store = ExecutionStore::new();
    let engine = Arc::new(WorkflowEngine::new(
        executor,
        store.clone(),
        config.engine_config(),
    ));

    let workflows = WorkflowStore::new();
    let workflow = workflows.insert(workflow);

    let stopper = Arc::clone(&engine);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping workflow");
            stopper.stop();
        }
    });

    let report = engine.run(&workflows, &workflow.id).await;
    ctrl_c.abort();
    let report = report.map_err(|e| anyhow!("Workflow execution failed: {}", e))?;

    print_report(&report);
    print_log(&store, &report.run_id);

    if let Some(output_path) = output {
        let json_content = serde_json::to_string_pretty(&report)
            .map_err(|e| anyhow!("Failed to serialize results to JSON: {}", e))?;
        tokio::fs::write(&output_path, json_content)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to write output file '{}': {}",
                    output_path.display(),
                    e
                )
            })?;
        info!("Results written to: {}", output_path.display());
    }

    if report.is_completed() {
        info!("Workflow execution completed");
        Ok(())
    } else {
        Err(anyhow!("Workflow '{}' {}", report.workflow_name, report.outcome))
    }
}

/// Validate a workflow file
pub async fn validate_workflow(workflow_path: PathBuf, _config: &Config) -> Result<()> {
    info!("Validating workflow: {}", workflow_path.display());

    let workflow = load_workflow(&workflow_path).await?;
    let report = TaskRegistry::new().validate_workflow(&workflow);
    ensure_valid(&workflow, &report)?;

    println!("✓ Workflow '{}' is valid", workflow.name);
    println!("  Tasks: {}", workflow.tasks.len());
    for task in &workflow.tasks {
        println!("    {}. {} ({})", task.order + 1, task.name, task.task_type);
    }

    info!("Workflow validation completed successfully");
    Ok(())
}

/// Initialize a new workflow file
pub async fn init_workflow(name: String, output_dir: PathBuf, template: String) -> Result<()> {
    info!(
        "Initializing workflow '{}' in {}",
        name,
        output_dir.display()
    );

    let workflow_content = generate_workflow_template(&name, &template)?;

    if !output_dir.exists() {
        tokio::fs::create_dir_all(&output_dir).await?;
    }

    let workflow_file = output_dir.join(format!("{}.yaml", name));
    if workflow_file.exists() {
        return Err(anyhow!(
            "Workflow file already exists: {}",
            workflow_file.display()
        ));
    }

    tokio::fs::write(&workflow_file, workflow_content).await?;
    println!("Created workflow file: {}", workflow_file.display());

    Ok(())
}

/// Print the registered task types and their input schema
pub fn list_tasks() -> Result<()> {
    let registry = TaskRegistry::new();

    for definition in registry.definitions() {
        println!("{} ({})", definition.task_type, definition.name);
        for (input, spec) in &definition.inputs {
            let mut line = format!("    {}: {}", input, spec.kind);
            if spec.required {
                line.push_str(", required");
            }
            if let Some(ref default) = spec.default {
                line.push_str(&format!(", default {}", default));
            }
            println!("{}", line);
        }
    }

    Ok(())
}

async fn load_workflow(path: &Path) -> Result<Workflow> {
    let workflow = WorkflowParser::parse_file(path)
        .await
        .map_err(|e| anyhow!("Failed to parse workflow: {}", e))?;
    info!("Loaded workflow: {} ({} tasks)", workflow.name, workflow.tasks.len());
    Ok(workflow)
}

fn ensure_valid(workflow: &Workflow, report: &ValidationReport) -> Result<()> {
    for warning in &report.warnings {
        warn!("Workflow validation warning: {}", warning);
    }

    if report.is_valid {
        return Ok(());
    }

    let error_messages: Vec<String> = report.errors.iter().map(|e| format!("  - {}", e)).collect();
    Err(anyhow!(
        "Workflow '{}' failed validation:\n{}",
        workflow.name,
        error_messages.join("\n")
    ))
}

fn print_report(report: &RunReport) {
    println!(
        "Workflow '{}' finished: {}",
        report.workflow_name, report.outcome
    );

    for task in &report.tasks {
        let timing = task
            .execution_time_ms
            .map(|ms| format!(" in {}ms", ms))
            .unwrap_or_default();
        println!("  Task '{}' ({}): {}{}", task.name, task.task_type, task.status, timing);

        if let Some(ref result) = task.result {
            if !result.outputs.is_empty() {
                println!("    Outputs: {}", serde_json::Value::Object(result.outputs.clone()));
            }
            if let Some(ref error) = result.error {
                println!("    Error: {}", error);
            }
        }
    }

    println!(
        "  {} of {} tasks succeeded",
        report.summary.successful_tasks, report.summary.total_tasks
    );
}

fn print_log(store: &ExecutionStore, run_id: &str) {
    let state = store.snapshot();
    let entries = state.logs_for_run(run_id);
    if entries.is_empty() {
        return;
    }

    println!("Execution log:");
    for entry in entries {
        let marker = match entry.kind {
            LogKind::Info => "info",
            LogKind::Success => "ok",
            LogKind::Error => "error",
        };
        println!(
            "  [{}] {:<5} {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            marker,
            entry.message
        );
    }
}

/// Generate workflow template content
fn generate_workflow_template(name: &str, template_type: &str) -> Result<String> {
    match template_type {
        "basic" => Ok(generate_basic_template(name)),
        "email" => Ok(generate_email_template(name)),
        _ => Err(anyhow!("Unknown template type: {}", template_type)),
    }
}

fn generate_basic_template(name: &str) -> String {
    format!(
        r#"name: {}
description: A basic workflow template

tasks:
  - name: Announce start
    type: log
    config:
      message: Workflow started
      level: info

  - name: Add numbers
    type: calculation
    config:
      operation: add
      value1: 2
      value2: 3

  - name: Announce finish
    type: log
    config:
      message: Workflow finished
"#,
        name
    )
}

fn generate_email_template(name: &str) -> String {
    format!(
        r#"name: {}
description: Compute a total and email it

tasks:
  - name: Compute total
    type: calculation
    config:
      operation: multiply
      value1: 4
      value2: 3

  - name: Send report
    type: email
    config:
      to: team@example.com
      subject: Daily total
      body: The daily total has been computed.

  - name: Record delivery
    type: log
    config:
      message: Report sent
      level: info
"#,
        name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse_and_validate() {
        let registry = TaskRegistry::new();
        for template in ["basic", "email"] {
            let yaml = generate_workflow_template("demo", template).unwrap();
            let workflow = WorkflowParser::from_yaml(&yaml).unwrap();
            assert_eq!(workflow.name, "demo");
            assert!(registry.validate_workflow(&workflow).is_valid, "{}", template);
        }
        assert!(generate_workflow_template("demo", "complex").is_err());
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().to_path_buf();

        init_workflow("flow".to_string(), dir.clone(), "basic".to_string())
            .await
            .unwrap();
        assert!(dir.join("flow.yaml").exists());

        let err = init_workflow("flow".to_string(), dir, "basic".to_string())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
