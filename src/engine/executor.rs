// ABOUTME: Task executor dispatching one task to its built-in or registered handler
// ABOUTME: Contains every handler failure and panic inside a uniform TaskResult

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::error::TaskError;
use super::notify::Notifier;
use super::result::TaskResult;
use crate::tasks::{
    calculation, email, log, BuiltinTask, ConfigMap, LogSink, TaskHandler, TaskRegistry,
    TracingLogSink,
};

/// Delay applied by the email task before it reports the message as sent
pub const DEFAULT_EMAIL_DELAY: Duration = Duration::from_millis(1000);

pub struct TaskExecutor {
    registry: Arc<TaskRegistry>,
    notifier: Arc<dyn Notifier>,
    log_sink: Arc<dyn LogSink>,
    email_delay: Duration,
}

impl TaskExecutor {
    /// Create a new task executor writing log tasks through tracing
    pub fn new(registry: Arc<TaskRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            registry,
            notifier,
            log_sink: Arc::new(TracingLogSink),
            email_delay: DEFAULT_EMAIL_DELAY,
        }
    }

    pub fn with_log_sink(mut self, log_sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    pub fn with_email_delay(mut self, email_delay: Duration) -> Self {
        self.email_delay = email_delay;
        self
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Execute one task. Never fails: every problem is reported as an
    /// unsuccessful result carrying the task type's failure outputs.
    #[instrument(skip(self, config))]
    pub async fn execute_task(&self, task_type: &str, config: &ConfigMap) -> TaskResult {
        let config = self.registry.apply_defaults(task_type, config);

        let outcome = match BuiltinTask::parse(task_type, &config) {
            Some(Ok(task)) => self.run_builtin(task).await,
            Some(Err(e)) => Err(e),
            None => match self.registry.handler(task_type) {
                Some(handler) => return self.run_handler(handler, &config).await,
                None => {
                    warn!("No handler for task type '{}'", task_type);
                    return TaskResult::failure(
                        ConfigMap::new(),
                        TaskError::UnknownTaskType.to_string(),
                    );
                }
            },
        };

        match outcome {
            Ok(outputs) => TaskResult::success(outputs),
            Err(e) => {
                debug!("Task of type '{}' failed: {}", task_type, e);
                TaskResult::failure(BuiltinTask::failure_outputs(task_type), e.to_string())
            }
        }
    }

    /// Outputs that accompany a failure of `task_type`
    pub fn failure_outputs(&self, task_type: &str) -> ConfigMap {
        if BuiltinTask::is_builtin(task_type) {
            return BuiltinTask::failure_outputs(task_type);
        }
        self.registry
            .handler(task_type)
            .map(|handler| handler.failure_outputs())
            .unwrap_or_default()
    }

    async fn run_builtin(&self, task: BuiltinTask) -> Result<ConfigMap, TaskError> {
        match task {
            BuiltinTask::Email(config) => {
                email::send(&config, self.email_delay, self.notifier.as_ref()).await
            }
            BuiltinTask::Log(config) => log::execute(&config, self.log_sink.as_ref()),
            BuiltinTask::Calculation(config) => calculation::execute(&config),
        }
    }

    async fn run_handler(&self, handler: Arc<dyn TaskHandler>, config: &ConfigMap) -> TaskResult {
        match AssertUnwindSafe(handler.execute(config)).catch_unwind().await {
            Ok(Ok(outputs)) => TaskResult::success(outputs),
            Ok(Err(e)) => TaskResult::failure(handler.failure_outputs(), e.to_string()),
            Err(payload) => {
                let error = TaskError::Panicked(panic_message(payload.as_ref()));
                warn!("{}", error);
                TaskResult::failure(handler.failure_outputs(), error.to_string())
            }
        }
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("task_types", &self.registry.list_supported_tasks())
            .field("email_delay", &self.email_delay)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::notify::{ChannelNotifier, Notification};
    use crate::tasks::{InputSpec, LogLevel, TaskDefinition, ValueKind};
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    fn config(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<(LogLevel, String)>>,
    }

    impl LogSink for RecordingSink {
        fn emit(&self, level: LogLevel, message: &str) -> Result<(), TaskError> {
            self.lines.lock().push((level, message.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        executor: TaskExecutor,
        notifications: mpsc::UnboundedReceiver<Notification>,
        sink: Arc<RecordingSink>,
    }

    fn fixture(registry: TaskRegistry) -> Fixture {
        let (tx, notifications) = mpsc::unbounded_channel();
        let sink = Arc::new(RecordingSink::default());
        let executor = TaskExecutor::new(Arc::new(registry), Arc::new(ChannelNotifier::new(tx)))
            .with_log_sink(sink.clone())
            .with_email_delay(Duration::ZERO);
        Fixture {
            executor,
            notifications,
            sink,
        }
    }

    async fn calculate(executor: &TaskExecutor, operation: &str, a: i64, b: i64) -> TaskResult {
        executor
            .execute_task(
                "calculation",
                &config(json!({"operation": operation, "value1": a, "value2": b})),
            )
            .await
    }

    #[tokio::test]
    async fn test_calculation_results() {
        let f = fixture(TaskRegistry::new());

        let cases = [
            ("add", 2, 3, 5),
            ("subtract", 5, 2, 3),
            ("multiply", 4, 3, 12),
            ("divide", 10, 2, 5),
        ];
        for (operation, a, b, expected) in cases {
            let result = calculate(&f.executor, operation, a, b).await;
            assert!(result.success, "{} failed: {:?}", operation, result.error);
            assert_eq!(result.outputs["result"], json!(expected));
            assert!(result.error.is_none());
        }
    }

    #[tokio::test]
    async fn test_division_by_zero() {
        let f = fixture(TaskRegistry::new());
        let result = calculate(&f.executor, "divide", 10, 0).await;

        assert!(!result.success);
        assert_eq!(result.outputs, config(json!({"result": 0})));
        assert_eq!(result.error.as_deref(), Some("Division by zero"));
    }

    #[tokio::test]
    async fn test_invalid_operation() {
        let f = fixture(TaskRegistry::new());
        let result = calculate(&f.executor, "modulo", 10, 3).await;

        assert!(!result.success);
        assert_eq!(result.outputs, config(json!({"result": 0})));
        assert_eq!(result.error.as_deref(), Some("Invalid operation"));
    }

    #[tokio::test]
    async fn test_missing_operation_uses_default() {
        let f = fixture(TaskRegistry::new());
        let result = f
            .executor
            .execute_task("calculation", &config(json!({"value1": 1, "value2": 1})))
            .await;
        assert_eq!(result.outputs["result"], json!(2));
    }

    #[tokio::test]
    async fn test_unknown_task_type_has_no_side_effects() {
        let mut f = fixture(TaskRegistry::new());
        let result = f
            .executor
            .execute_task("sms", &config(json!({"to": "+15550100", "message": "hi"})))
            .await;

        assert!(!result.success);
        assert!(result.outputs.is_empty());
        assert_eq!(result.error.as_deref(), Some("Unknown task type"));
        assert!(f.notifications.try_recv().is_err());
        assert!(f.sink.lines.lock().is_empty());
    }

    #[tokio::test]
    async fn test_log_task_writes_to_sink() {
        let f = fixture(TaskRegistry::new());
        let result = f
            .executor
            .execute_task("log", &config(json!({"message": "Task A"})))
            .await;

        assert!(result.success);
        assert_eq!(result.outputs["logged"], json!(true));
        assert_eq!(
            f.sink.lines.lock().as_slice(),
            &[(LogLevel::Info, "Task A".to_string())]
        );
    }

    #[tokio::test]
    async fn test_log_task_accepts_any_level() {
        let f = fixture(TaskRegistry::new());
        let log_config = config(json!({"message": "hello", "level": "debug"}));

        assert!(f.executor.registry().validate("log", &log_config).is_ok());

        let result = f.executor.execute_task("log", &log_config).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.outputs, config(json!({"logged": true})));
        assert_eq!(
            f.sink.lines.lock().as_slice(),
            &[(LogLevel::Info, "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn test_email_task_notifies() {
        let mut f = fixture(TaskRegistry::new());
        let result = f
            .executor
            .execute_task(
                "email",
                &config(json!({"to": "ops@example.com", "subject": "Deploy", "body": "Done"})),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.outputs["sent"], json!(true));
        let notification = f.notifications.try_recv().unwrap();
        assert_eq!(notification.title, "Email Sent");
        assert_eq!(notification.description, "To: ops@example.com\nSubject: Deploy");
    }

    #[tokio::test]
    async fn test_malformed_builtin_config() {
        let mut f = fixture(TaskRegistry::new());
        let result = f
            .executor
            .execute_task("email", &config(json!({"to": "ops@example.com"})))
            .await;

        assert!(!result.success);
        assert_eq!(result.outputs, config(json!({"sent": false})));
        assert!(result
            .error_message()
            .starts_with("Invalid email configuration"));
        assert!(f.notifications.try_recv().is_err());
    }

    struct Flaky;

    #[async_trait]
    impl TaskHandler for Flaky {
        fn definition(&self) -> TaskDefinition {
            let mut inputs = IndexMap::new();
            inputs.insert("mode".to_string(), InputSpec::required(ValueKind::String));
            TaskDefinition {
                task_type: "flaky".to_string(),
                name: "Flaky".to_string(),
                inputs,
                outputs: IndexMap::new(),
                validator: None,
            }
        }

        async fn execute(&self, config: &ConfigMap) -> Result<ConfigMap, TaskError> {
            match config.get("mode").and_then(Value::as_str) {
                Some("ok") => Ok(config.clone()),
                Some("panic") => panic!("flaky handler blew up"),
                _ => Err(TaskError::Failed("flaky handler refused".to_string())),
            }
        }

        fn failure_outputs(&self) -> ConfigMap {
            config(json!({"ok": false}))
        }
    }

    #[tokio::test]
    async fn test_custom_handler_dispatch() {
        let mut registry = TaskRegistry::new();
        registry.register_handler(Arc::new(Flaky));
        let f = fixture(registry);

        let ok = f
            .executor
            .execute_task("flaky", &config(json!({"mode": "ok"})))
            .await;
        assert!(ok.success);
        assert_eq!(ok.outputs["mode"], json!("ok"));

        let refused = f
            .executor
            .execute_task("flaky", &config(json!({"mode": "no"})))
            .await;
        assert_eq!(refused.error.as_deref(), Some("flaky handler refused"));
        assert_eq!(refused.outputs, config(json!({"ok": false})));

        assert_eq!(f.executor.failure_outputs("flaky"), config(json!({"ok": false})));
        assert_eq!(f.executor.failure_outputs("email"), config(json!({"sent": false})));
        assert!(f.executor.failure_outputs("sms").is_empty());
    }

    #[tokio::test]
    async fn test_custom_handler_panic_is_contained() {
        let mut registry = TaskRegistry::new();
        registry.register_handler(Arc::new(Flaky));
        let f = fixture(registry);

        let result = f
            .executor
            .execute_task("flaky", &config(json!({"mode": "panic"})))
            .await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Task handler panicked: flaky handler blew up")
        );
    }
}
