// ABOUTME: Calculation task implementation for basic arithmetic
// ABOUTME: Performs add, subtract, multiply and divide with handled division by zero

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::info;

use super::registry::{InputSpec, TaskDefinition, ValueKind};
use super::ConfigMap;
use crate::engine::error::TaskError;

pub const TASK_TYPE: &str = "calculation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationConfig {
    /// Kept as text so an unknown operation surfaces as "Invalid operation"
    pub operation: String,
    pub value1: f64,
    pub value2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl FromStr for Operation {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" | "+" => Ok(Operation::Add),
            "subtract" | "-" => Ok(Operation::Subtract),
            "multiply" | "*" => Ok(Operation::Multiply),
            "divide" | "/" => Ok(Operation::Divide),
            _ => Err(TaskError::InvalidOperation),
        }
    }
}

impl Operation {
    pub const NAMES: [&'static str; 4] = ["add", "subtract", "multiply", "divide"];

    pub fn apply(self, value1: f64, value2: f64) -> Result<f64, TaskError> {
        let result = match self {
            Operation::Add => value1 + value2,
            Operation::Subtract => value1 - value2,
            Operation::Multiply => value1 * value2,
            Operation::Divide => {
                if value2 == 0.0 {
                    return Err(TaskError::DivisionByZero);
                }
                value1 / value2
            }
        };

        if !result.is_finite() {
            return Err(TaskError::Failed(
                "Calculation result is not a finite number".to_string(),
            ));
        }
        Ok(result)
    }
}

pub fn execute(config: &CalculationConfig) -> Result<ConfigMap, TaskError> {
    let operation: Operation = config.operation.parse()?;
    let result = operation.apply(config.value1, config.value2)?;

    info!("Calculation result: {}", result);

    let mut outputs = ConfigMap::new();
    outputs.insert("result".to_string(), number_value(result));
    Ok(outputs)
}

pub fn failure_outputs() -> ConfigMap {
    let mut outputs = ConfigMap::new();
    outputs.insert("result".to_string(), json!(0));
    outputs
}

/// Whole results are reported as integers so `2 + 3` reads as `5`, not `5.0`.
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

pub fn definition() -> TaskDefinition {
    let mut inputs = IndexMap::new();
    inputs.insert(
        "operation".to_string(),
        InputSpec::required(ValueKind::String).with_default(json!("add")),
    );
    inputs.insert("value1".to_string(), InputSpec::required(ValueKind::Number));
    inputs.insert("value2".to_string(), InputSpec::required(ValueKind::Number));

    let mut outputs = IndexMap::new();
    outputs.insert("result".to_string(), ValueKind::Number);

    TaskDefinition {
        task_type: TASK_TYPE.to_string(),
        name: "Perform Calculation".to_string(),
        inputs,
        outputs,
        validator: Some(validate_config),
    }
}

fn validate_config(config: &ConfigMap) -> Result<(), String> {
    let operation = config
        .get("operation")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let operation = operation.parse::<Operation>().map_err(|_| {
        format!(
            "operation must be one of {}",
            Operation::NAMES.join(", ")
        )
    })?;

    if operation == Operation::Divide && config.get("value2").and_then(Value::as_f64) == Some(0.0) {
        return Err("value2 cannot be zero for divide".to_string());
    }

    Ok(())
}
