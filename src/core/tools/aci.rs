//! ACI tool catalog client.
//!
//! Resolves function definitions from the ACI function-calling API and executes
//! functions on behalf of a linked-account owner.
//!
//! # API Reference
//!
//! - `GET {base}/functions/{name}/definition?format=openai`
//! - `POST {base}/functions/{name}/execute` with
//!   `{"function_input": {...}, "linked_account_owner_id": "..."}`
//! - Authentication via the `X-API-KEY` header

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroize;

use super::base::{
    FunctionDefinition, Tool, ToolError, ToolResult, app_name_of, parse_arguments,
};

/// Default ACI API base URL.
pub const ACI_DEFAULT_BASE_URL: &str = "https://api.aci.dev/v1";

/// Header carrying the ACI API key.
const API_KEY_HEADER: &str = "X-API-KEY";

/// Request timeout for catalog calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Wire Types
// =============================================================================

/// Definition envelope in OpenAI function format.
#[derive(Debug, Deserialize)]
struct DefinitionEnvelope {
    function: FunctionDefinition,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    function_input: serde_json::Value,
    linked_account_owner_id: &'a str,
}

/// Result of a function execution.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionExecutionResult {
    /// Whether the function ran successfully
    pub success: bool,
    /// Function output
    #[serde(default)]
    pub data: serde_json::Value,
    /// Error message when `success` is false
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the ACI function-calling API.
#[derive(Clone)]
pub struct AciClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for AciClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AciClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Drop for AciClient {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl AciClient {
    /// Create a client for the given base URL.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> ToolResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ToolError::Http("ACI API key is required".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ToolError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the OpenAI-format definition of a function.
    pub async fn get_definition(&self, function_name: &str) -> ToolResult<FunctionDefinition> {
        let url = format!("{}/functions/{}/definition", self.base_url, function_name);
        debug!(function = %function_name, "Fetching function definition");

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("format", "openai")])
            .send()
            .await
            .map_err(|e| ToolError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ToolError::DefinitionNotFound(function_name.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Http(format!(
                "{status}: {}",
                error_message_from_body(&body)
            )));
        }

        let envelope: DefinitionEnvelope = response
            .json()
            .await
            .map_err(|e| ToolError::Http(format!("Invalid definition payload: {e}")))?;

        Ok(envelope.function)
    }

    /// Execute a function for a linked-account owner and return its output.
    pub async fn execute(
        &self,
        function_name: &str,
        function_input: serde_json::Value,
        owner_id: &str,
    ) -> ToolResult<serde_json::Value> {
        let url = format!("{}/functions/{}/execute", self.base_url, function_name);
        debug!(function = %function_name, owner = %owner_id, "Executing function");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&ExecuteRequest {
                function_input,
                linked_account_owner_id: owner_id,
            })
            .send()
            .await
            .map_err(|e| ToolError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&body);
            warn!(function = %function_name, %status, "Function execution rejected: {}", message);
            return Err(classify_failure(Some(status), &message, function_name, owner_id));
        }

        let result: FunctionExecutionResult = response
            .json()
            .await
            .map_err(|e| ToolError::Http(format!("Invalid execution payload: {e}")))?;

        if result.success {
            Ok(result.data)
        } else {
            let message = result
                .error
                .unwrap_or_else(|| "function reported failure".to_string());
            Err(classify_failure(None, &message, function_name, owner_id))
        }
    }
}

/// Pull a human readable message out of an error body.
fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "detail", "message"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

fn mentions_linked_account(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("linked account") || lower.contains("linked_account")
}

/// Map a catalog failure to a typed tool error.
fn classify_failure(
    status: Option<StatusCode>,
    message: &str,
    function_name: &str,
    owner_id: &str,
) -> ToolError {
    if mentions_linked_account(message) {
        return ToolError::AccountNotLinked {
            app: app_name_of(function_name).to_string(),
            owner_id: owner_id.to_string(),
        };
    }
    match status {
        Some(status) => ToolError::Http(format!("{status}: {message}")),
        None => ToolError::Execution(message.to_string()),
    }
}

// =============================================================================
// Tool
// =============================================================================

/// A catalog function bound to one linked-account owner.
pub struct AciTool {
    client: Arc<AciClient>,
    definition: FunctionDefinition,
    owner_id: String,
}

impl AciTool {
    /// Create a tool from an already resolved definition.
    pub fn new(
        client: Arc<AciClient>,
        definition: FunctionDefinition,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            definition,
            owner_id: owner_id.into(),
        }
    }

    /// Resolve the function definition and bind it to `owner_id`.
    pub async fn load(
        client: Arc<AciClient>,
        function_name: &str,
        owner_id: &str,
    ) -> ToolResult<Self> {
        let definition = client.get_definition(function_name).await?;
        Ok(Self::new(client, definition, owner_id))
    }

    /// Owner the tool executes for.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

#[async_trait]
impl Tool for AciTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn description(&self) -> &str {
        &self.definition.description
    }

    fn parameters(&self) -> &serde_json::Value {
        &self.definition.parameters
    }

    async fn invoke(&self, arguments: &str) -> ToolResult<String> {
        let input = parse_arguments(arguments)?;
        let data = self
            .client
            .execute(&self.definition.name, input, &self.owner_id)
            .await?;
        serde_json::to_string(&data).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_api_key() {
        assert!(AciClient::new("", ACI_DEFAULT_BASE_URL).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = AciClient::new("key", "https://api.aci.dev/v1/").unwrap();
        assert_eq!(client.base_url(), "https://api.aci.dev/v1");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = AciClient::new("super-secret", ACI_DEFAULT_BASE_URL).unwrap();
        assert!(!format!("{client:?}").contains("super-secret"));
    }

    #[test]
    fn test_classify_linked_account_failure() {
        let err = classify_failure(
            Some(StatusCode::NOT_FOUND),
            "Linked account not found for owner personaassis0",
            "GITHUB__CREATE_ISSUE",
            "personaassis0",
        );
        assert_eq!(
            err,
            ToolError::AccountNotLinked {
                app: "GITHUB".to_string(),
                owner_id: "personaassis0".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_other_failures() {
        assert!(matches!(
            classify_failure(
                Some(StatusCode::INTERNAL_SERVER_ERROR),
                "boom",
                "SLACK__USERS_LIST",
                "o"
            ),
            ToolError::Http(_)
        ));
        assert!(matches!(
            classify_failure(None, "rate limited upstream", "SLACK__USERS_LIST", "o"),
            ToolError::Execution(_)
        ));
    }

    #[test]
    fn test_error_message_from_body() {
        assert_eq!(error_message_from_body(r#"{"error":"nope"}"#), "nope");
        assert_eq!(error_message_from_body(r#"{"detail":"missing"}"#), "missing");
        assert_eq!(error_message_from_body("plain text"), "plain text");
    }
}
