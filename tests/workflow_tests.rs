// ABOUTME: Integration tests for workflow definitions, parsing and the workflow store
// ABOUTME: Exercises YAML files on disk, task ordering and store change notifications

use serde_json::json;

mod common;
use common::{config, TestEnvironment, TestWorkflowBuilder};

use taskflow::tasks::TaskRegistry;
use taskflow::workflow::{
    NewTask, TaskUpdate, ValidationError, WorkflowError, WorkflowParser, WorkflowStatus,
    WorkflowStore,
};

#[tokio::test]
async fn test_parse_workflow_file() {
    let env = TestEnvironment::new();
    let builder = TestWorkflowBuilder::new("nightly")
        .with_description("Nightly checks")
        .add_log_task("announce", "starting")
        .add_calculation_task("sum", "add", 2.0, 3.0)
        .add_email_task("report", "ops@example.com");
    let path = env.create_workflow_file("nightly", &builder).await;

    let workflow = WorkflowParser::parse_file(&path).await.unwrap();

    assert_eq!(workflow.name, "nightly");
    assert_eq!(workflow.description.as_deref(), Some("Nightly checks"));
    assert_eq!(workflow.status, WorkflowStatus::Idle);
    assert_eq!(workflow.tasks.len(), 3);
    assert!(workflow.has_contiguous_order());
    assert_eq!(workflow.tasks[0].task_type, "log");
    assert_eq!(workflow.tasks[1].config["operation"], json!("add"));
    assert_eq!(workflow.tasks[2].config["to"], json!("ops@example.com"));

    let report = TaskRegistry::new().validate_workflow(&workflow);
    assert!(report.is_valid, "{:?}", report.errors);
}

#[tokio::test]
async fn test_parse_missing_file() {
    let env = TestEnvironment::new();
    let err = WorkflowParser::parse_file(env.workflow_file("absent"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::IoError(_)));
}

#[tokio::test]
async fn test_parse_rejects_empty_task_list() {
    let env = TestEnvironment::new();
    let path = env.workflow_file("empty");
    tokio::fs::write(&path, "name: empty\ntasks: []\n").await.unwrap();

    let err = WorkflowParser::parse_file(&path).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::ValidationError(ValidationError::EmptyWorkflow)
    ));
}

#[test]
fn test_yaml_roundtrip_keeps_order_and_config() {
    let mut workflow = TestWorkflowBuilder::new("roundtrip")
        .add_log_task("a", "first")
        .add_log_task("b", "second")
        .add_calculation_task("c", "multiply", 4.0, 2.5)
        .build();
    let c = workflow.tasks[2].id.clone();
    workflow.reorder_task(&c, 0);

    let parsed = WorkflowParser::from_yaml(&workflow.to_yaml().unwrap()).unwrap();

    let names: Vec<&str> = parsed.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["c", "a", "b"]);
    assert_eq!(parsed.tasks[0].config, workflow.tasks[0].config);
    // ids are minted per load
    assert_ne!(parsed.id, workflow.id);
}

#[test]
fn test_store_task_lifecycle() {
    let store = WorkflowStore::new();
    let workflow = store.add_workflow("ops", Some("Operations".to_string()));
    assert_eq!(store.get(&workflow.id).unwrap(), workflow);

    let first = store
        .add_task(&workflow.id, NewTask::new("a", "log", config(json!({"message": "a"}))))
        .unwrap();
    let second = store
        .add_task(&workflow.id, NewTask::new("b", "log", config(json!({"message": "b"}))))
        .unwrap();
    let third = store
        .add_task(&workflow.id, NewTask::new("c", "log", config(json!({"message": "c"}))))
        .unwrap();
    assert_eq!((first.order, second.order, third.order), (0, 1, 2));

    let updated = store
        .update_task(
            &workflow.id,
            &second.id,
            TaskUpdate::default().name("b2").description("renamed"),
        )
        .unwrap();
    assert_eq!(updated.name, "b2");
    assert_eq!(updated.order, 1);
    assert_eq!(updated.id, second.id);

    store.reorder_tasks(&workflow.id, &first.id, 2).unwrap();
    let stored = store.get(&workflow.id).unwrap();
    let names: Vec<&str> = stored.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["b2", "c", "a"]);
    assert!(stored.has_contiguous_order());

    store.remove_task(&workflow.id, &third.id).unwrap();
    let stored = store.get(&workflow.id).unwrap();
    assert_eq!(stored.tasks.len(), 2);
    assert!(stored.has_contiguous_order());

    let err = store.remove_task(&workflow.id, &third.id).unwrap_err();
    assert!(matches!(err, WorkflowError::TaskNotFound { .. }));

    store.remove_workflow(&workflow.id).unwrap();
    assert!(store.list().is_empty());
    assert!(matches!(
        store.set_status(&workflow.id, WorkflowStatus::Running),
        Err(WorkflowError::WorkflowNotFound(_))
    ));
}

#[test]
fn test_reorder_out_of_range_moves_to_end() {
    let store = WorkflowStore::new();
    let workflow = store.insert(
        TestWorkflowBuilder::new("clamp")
            .add_log_task("a", "a")
            .add_log_task("b", "b")
            .add_log_task("c", "c")
            .build(),
    );
    let a = workflow.tasks[0].id.clone();

    store.reorder_tasks(&workflow.id, &a, 99).unwrap();

    let stored = store.get(&workflow.id).unwrap();
    assert_eq!(stored.tasks.last().unwrap().id, a);
    let orders: Vec<usize> = stored.tasks.iter().map(|t| t.order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_store_notifies_subscribers() {
    let store = WorkflowStore::new();
    let mut changes = store.subscribe();
    changes.mark_unchanged();

    let workflow = store.add_workflow("watched", None);
    assert!(changes.has_changed().unwrap());
    changes.mark_unchanged();

    // failed mutations leave subscribers alone
    assert!(store.remove_task(&workflow.id, "missing").is_err());
    assert!(!changes.has_changed().unwrap());

    store.set_status(&workflow.id, WorkflowStatus::Running).unwrap();
    changes.changed().await.unwrap();
    assert_eq!(
        changes.borrow_and_update().workflows[0].status,
        WorkflowStatus::Running
    );
}
