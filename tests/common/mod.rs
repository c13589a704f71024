// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides workflow builders, recording ports and engine fixtures

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;
use tokio::sync::mpsc;

use taskflow::engine::{
    ChannelNotifier, EngineConfig, ExecutionStore, Notification, TaskError, TaskExecutor,
    WorkflowEngine,
};
use taskflow::tasks::{ConfigMap, LogLevel, LogSink, TaskRegistry};
use taskflow::workflow::{NewTask, Workflow};

pub struct TestWorkflowBuilder {
    name: String,
    description: String,
    tasks: Vec<TestTask>,
}

pub struct TestTask {
    pub name: String,
    pub task_type: String,
    pub config: Value,
}

impl TestWorkflowBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Test workflow: {}", name),
            tasks: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn add_task(mut self, name: &str, task_type: &str, config: Value) -> Self {
        self.tasks.push(TestTask {
            name: name.to_string(),
            task_type: task_type.to_string(),
            config,
        });
        self
    }

    pub fn add_log_task(self, name: &str, message: &str) -> Self {
        self.add_task(name, "log", json!({"message": message, "level": "info"}))
    }

    pub fn add_calculation_task(self, name: &str, operation: &str, value1: f64, value2: f64) -> Self {
        self.add_task(
            name,
            "calculation",
            json!({"operation": operation, "value1": value1, "value2": value2}),
        )
    }

    pub fn add_email_task(self, name: &str, to: &str) -> Self {
        self.add_task(
            name,
            "email",
            json!({"to": to, "subject": "Test run", "body": "Sent from a test"}),
        )
    }

    pub fn build(&self) -> Workflow {
        let mut workflow = Workflow::new(self.name.clone(), Some(self.description.clone()));
        for task in &self.tasks {
            workflow.push_task(NewTask::new(
                task.name.clone(),
                task.task_type.clone(),
                task.config.as_object().cloned().unwrap_or_default(),
            ));
        }
        workflow
    }

    pub fn generate_yaml(&self) -> String {
        let mut yaml = format!(
            "name: {}\ndescription: \"{}\"\n\ntasks:\n",
            self.name, self.description
        );

        for task in &self.tasks {
            yaml.push_str(&format!("  - name: \"{}\"\n", task.name));
            yaml.push_str(&format!("    type: {}\n", task.task_type));
            yaml.push_str("    config:\n");
            if let Some(config) = task.config.as_object() {
                for (key, value) in config {
                    yaml.push_str(&format!("      {}: {}\n", key, value));
                }
            }
            yaml.push('\n');
        }

        yaml
    }

    pub async fn write_to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        fs::write(path, self.generate_yaml()).await?;
        Ok(())
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn workflow_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}.yaml", name))
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}_output.json", name))
    }

    pub async fn create_workflow_file(&self, name: &str, builder: &TestWorkflowBuilder) -> PathBuf {
        let workflow_file = self.workflow_file(name);
        builder
            .write_to_file(&workflow_file)
            .await
            .expect("Failed to write workflow file");
        workflow_file
    }
}

/// Log sink that remembers every message written by log tasks
#[derive(Default)]
pub struct RecordingSink {
    pub lines: Mutex<Vec<(LogLevel, String)>>,
}

impl LogSink for RecordingSink {
    fn emit(&self, level: LogLevel, message: &str) -> Result<(), TaskError> {
        self.lines.lock().push((level, message.to_string()));
        Ok(())
    }
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.lines.lock().iter().map(|(_, m)| m.clone()).collect()
    }
}

pub struct EngineFixture {
    pub engine: Arc<WorkflowEngine>,
    pub store: ExecutionStore,
    pub sink: Arc<RecordingSink>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl EngineFixture {
    pub fn new() -> Self {
        Self::with_registry(TaskRegistry::new(), Duration::ZERO)
    }

    pub fn with_registry(registry: TaskRegistry, email_delay: Duration) -> Self {
        let (tx, notifications) = mpsc::unbounded_channel();
        let sink = Arc::new(RecordingSink::default());
        let executor = TaskExecutor::new(Arc::new(registry), Arc::new(ChannelNotifier::new(tx)))
            .with_log_sink(sink.clone())
            .with_email_delay(email_delay);
        let store = ExecutionStore::new();
        let engine = Arc::new(WorkflowEngine::new(
            executor,
            store.clone(),
            EngineConfig::default(),
        ));

        Self {
            engine,
            store,
            sink,
            notifications,
        }
    }

    pub fn notification_titles(&mut self) -> Vec<String> {
        let mut titles = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            titles.push(notification.title);
        }
        titles
    }
}

pub fn config(value: Value) -> ConfigMap {
    value.as_object().cloned().unwrap_or_default()
}
