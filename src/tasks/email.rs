// ABOUTME: Email task implementation for sending notifications
// ABOUTME: Simulates delivery with a configurable delay and reports it through the notifier

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use super::registry::{InputSpec, TaskDefinition, ValueKind};
use super::ConfigMap;
use crate::engine::error::TaskError;
use crate::engine::notify::{Notification, Notifier};

pub const TASK_TYPE: &str = "email";

static EMAIL_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email address pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Simulate sending `config` after `delay`, then announce it.
pub async fn send(
    config: &EmailConfig,
    delay: Duration,
    notifier: &dyn Notifier,
) -> Result<ConfigMap, TaskError> {
    info!("Sending email to {} with subject '{}'", config.to, config.subject);

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    notifier.notify(Notification::new(
        "Email Sent",
        format!("To: {}\nSubject: {}", config.to, config.subject),
    ));

    let mut outputs = ConfigMap::new();
    outputs.insert("sent".to_string(), json!(true));
    Ok(outputs)
}

pub fn failure_outputs() -> ConfigMap {
    let mut outputs = ConfigMap::new();
    outputs.insert("sent".to_string(), json!(false));
    outputs
}

pub fn is_valid_address(address: &str) -> bool {
    EMAIL_ADDRESS.is_match(address)
}

pub fn definition() -> TaskDefinition {
    let mut inputs = IndexMap::new();
    inputs.insert("to".to_string(), InputSpec::required(ValueKind::String));
    inputs.insert("subject".to_string(), InputSpec::required(ValueKind::String));
    inputs.insert("body".to_string(), InputSpec::required(ValueKind::String));

    let mut outputs = IndexMap::new();
    outputs.insert("sent".to_string(), ValueKind::Boolean);

    TaskDefinition {
        task_type: TASK_TYPE.to_string(),
        name: "Send Email".to_string(),
        inputs,
        outputs,
        validator: Some(validate_config),
    }
}

fn validate_config(config: &ConfigMap) -> Result<(), String> {
    let text = |key: &str| config.get(key).and_then(Value::as_str).unwrap_or_default();

    if !is_valid_address(text("to")) {
        return Err(format!("'{}' is not a valid email address", text("to")));
    }
    if text("subject").is_empty() {
        return Err("subject cannot be empty".to_string());
    }
    if text("body").is_empty() {
        return Err("body cannot be empty".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::notify::ChannelNotifier;
    use tokio::sync::mpsc;

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("ops@example.com"));
        assert!(!is_valid_address("ops@example"));
        assert!(!is_valid_address("ops example.com"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_email_config_validation() {
        let valid = json!({"to": "a@b.io", "subject": "Hi", "body": "Body"});
        assert!(validate_config(valid.as_object().unwrap()).is_ok());

        let bad_address = json!({"to": "nobody", "subject": "Hi", "body": "Body"});
        assert!(validate_config(bad_address.as_object().unwrap()).is_err());

        let no_body = json!({"to": "a@b.io", "subject": "Hi", "body": ""});
        assert!(validate_config(no_body.as_object().unwrap()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_waits_then_notifies() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = ChannelNotifier::new(tx);
        let config = EmailConfig {
            to: "ops@example.com".to_string(),
            subject: "Deploy".to_string(),
            body: "Done".to_string(),
        };

        let started = tokio::time::Instant::now();
        let outputs = send(&config, Duration::from_millis(1000), &notifier)
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(outputs["sent"], json!(true));

        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.title, "Email Sent");
        assert_eq!(notification.description, "To: ops@example.com\nSubject: Deploy");
    }
}
