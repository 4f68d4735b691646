//! Base traits and types for callable tools.
//!
//! A tool is a named, schema-described external action the realtime session
//! may invoke mid-conversation. Tools are handed to the model as function
//! definitions and invoked with the JSON argument string the model produced.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while resolving or invoking a tool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The catalog has no linked account for this app and owner.
    ///
    /// This is the only tool failure the client is told how to fix.
    #[error("No linked {app} account for owner '{owner_id}'")]
    AccountNotLinked {
        /// App name (function-name prefix, e.g. `GITHUB`)
        app: String,
        /// Linked-account owner the call was made for
        owner_id: String,
    },

    /// The function definition could not be found
    #[error("Function definition not found: {0}")]
    DefinitionNotFound(String),

    /// The model supplied arguments that are not valid JSON
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// Transport or HTTP status failure talking to the catalog
    #[error("Tool catalog request failed: {0}")]
    Http(String),

    /// The catalog executed the function and reported a failure
    #[error("Tool execution failed: {0}")]
    Execution(String),
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

// =============================================================================
// Definitions
// =============================================================================

/// Function definition as exposed to the realtime model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Function description
    #[serde(default)]
    pub description: String,
    /// Function parameters JSON schema
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,
}

/// Schema for a function that takes no arguments.
pub fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": [],
        "additionalProperties": false
    })
}

/// Derive the app name from a catalog function name (`GITHUB__LIST_ISSUES` -> `GITHUB`).
pub fn app_name_of(function_name: &str) -> &str {
    function_name
        .split_once("__")
        .map(|(app, _)| app)
        .unwrap_or(function_name)
}

// =============================================================================
// Tool Trait
// =============================================================================

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique function name
    fn name(&self) -> &str;

    /// Human readable description handed to the model
    fn description(&self) -> &str;

    /// JSON schema of the arguments
    fn parameters(&self) -> &serde_json::Value;

    /// Invoke the tool with the raw JSON argument string.
    ///
    /// The returned string is submitted back to the model as the call output.
    async fn invoke(&self, arguments: &str) -> ToolResult<String>;

    /// Function definition built from the accessors above.
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().clone(),
        }
    }
}

/// Parse a model-supplied argument string into a JSON value.
///
/// Empty input is treated as an empty object; some models send `""` for
/// parameterless functions.
pub fn parse_arguments(arguments: &str) -> ToolResult<serde_json::Value> {
    if arguments.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}
