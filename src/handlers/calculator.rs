//! Arithmetic tools: `add`, `subtract`, `multiply`, `divide`.
//!
//! Every tool takes two numeric arguments `a` and `b` and returns the
//! result as text with six decimal places.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::ToolHandler;
use crate::error::HandlerError;
use crate::protocol::{Content, Tool};

/// The calculator tool set.
#[derive(Debug, Default, Clone, Copy)]
pub struct CalculatorTools;

impl CalculatorTools {
    /// Creates the calculator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// The shared input schema: two required numbers.
fn binary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": { "type": "number", "description": "First operand" },
            "b": { "type": "number", "description": "Second operand" }
        },
        "required": ["a", "b"]
    })
}

/// Extracts a required numeric argument.
fn number_arg(arguments: &Value, key: &str) -> Result<f64, HandlerError> {
    arguments
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| HandlerError::InvalidInput(format!("missing numeric argument '{key}'")))
}

#[async_trait]
impl ToolHandler for CalculatorTools {
    async fn list_tools(&self) -> Result<Vec<Tool>, HandlerError> {
        let describe = |name: &str, description: &str| Tool {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: binary_schema(),
        };

        Ok(vec![
            describe("add", "Adds two numbers"),
            describe("subtract", "Subtracts the second number from the first"),
            describe("multiply", "Multiplies two numbers"),
            describe("divide", "Divides the first number by the second"),
        ])
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Vec<Content>, HandlerError> {
        let a = number_arg(arguments, "a")?;
        let b = number_arg(arguments, "b")?;

        let result = match name {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    return Err(HandlerError::InvalidInput("division by zero".to_string()));
                }
                a / b
            }
            other => return Err(HandlerError::NotFound(other.to_string())),
        };

        Ok(vec![Content::text(format!("{result:.6}"))])
    }
}
