use std::fmt;
use std::sync::Arc;

use super::guardrail::OutputGuardrail;
use crate::core::tools::{FunctionDefinition, Tool, empty_object_schema};

/// Prefix of the synthetic tools that transfer control between agents.
pub const HANDOFF_TOOL_PREFIX: &str = "transfer_to_";

/// An agent the realtime session can run: instructions, tools, and the agents
/// it may hand the conversation to.
pub struct RealtimeAgent {
    name: String,
    instructions: String,
    tools: Vec<Arc<dyn Tool>>,
    handoffs: Vec<Arc<RealtimeAgent>>,
    output_guardrails: Vec<Arc<dyn OutputGuardrail>>,
}

impl fmt::Debug for RealtimeAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeAgent")
            .field("name", &self.name)
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field(
                "handoffs",
                &self.handoffs.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("output_guardrails", &self.output_guardrails.len())
            .finish()
    }
}

impl RealtimeAgent {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
            handoffs: Vec::new(),
            output_guardrails: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_handoffs(mut self, handoffs: Vec<Arc<RealtimeAgent>>) -> Self {
        self.handoffs = handoffs;
        self
    }

    pub fn with_output_guardrails(mut self, guardrails: Vec<Arc<dyn OutputGuardrail>>) -> Self {
        self.output_guardrails = guardrails;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn handoffs(&self) -> &[Arc<RealtimeAgent>] {
        &self.handoffs
    }

    pub fn output_guardrails(&self) -> &[Arc<dyn OutputGuardrail>] {
        &self.output_guardrails
    }

    /// Look up one of this agent's tools by function name.
    pub fn find_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Look up the handoff target whose transfer tool is named `tool_name`.
    pub fn find_handoff(&self, tool_name: &str) -> Option<Arc<RealtimeAgent>> {
        self.handoffs
            .iter()
            .find(|a| a.handoff_tool_name() == tool_name)
            .cloned()
    }

    /// Name of the tool that transfers control to this agent.
    pub fn handoff_tool_name(&self) -> String {
        format!("{HANDOFF_TOOL_PREFIX}{}", function_style(&self.name))
    }

    /// Function definition of the tool that transfers control to this agent.
    pub fn handoff_definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: self.handoff_tool_name(),
            description: format!(
                "Handoff to the {} agent to handle the request.",
                self.name
            ),
            parameters: empty_object_schema(),
        }
    }

    /// Every function the model may call while this agent is in control.
    pub fn function_definitions(&self) -> Vec<FunctionDefinition> {
        self.tools
            .iter()
            .map(|t| t.definition())
            .chain(self.handoffs.iter().map(|a| a.handoff_definition()))
            .collect()
    }
}

/// Lowercase, spaces to underscores, drop everything else non-alphanumeric.
fn function_style(name: &str) -> String {
    name.trim()
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c == ' ' || c == '_' || c == '-' {
                Some('_')
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tools::ToolResult;
    use async_trait::async_trait;

    struct EchoTool {
        schema: serde_json::Value,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "ECHO__SAY"
        }
        fn description(&self) -> &str {
            "Echo the input"
        }
        fn parameters(&self) -> &serde_json::Value {
            &self.schema
        }
        async fn invoke(&self, arguments: &str) -> ToolResult<String> {
            Ok(arguments.to_string())
        }
    }

    #[test]
    fn test_handoff_tool_name() {
        let agent = RealtimeAgent::new("Google Calendar Assistant", "help");
        assert_eq!(
            agent.handoff_tool_name(),
            "transfer_to_google_calendar_assistant"
        );
    }

    #[test]
    fn test_function_definitions_include_handoffs() {
        let github = Arc::new(RealtimeAgent::new("Github Assistant", "gh"));
        let root = RealtimeAgent::new("Assistant", "root")
            .with_tools(vec![Arc::new(EchoTool {
                schema: empty_object_schema(),
            })])
            .with_handoffs(vec![github]);

        let names: Vec<String> = root
            .function_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["ECHO__SAY", "transfer_to_github_assistant"]);

        assert!(root.find_tool("ECHO__SAY").is_some());
        assert!(root.find_tool("missing").is_none());
        assert_eq!(
            root.find_handoff("transfer_to_github_assistant")
                .map(|a| a.name().to_string()),
            Some("Github Assistant".to_string())
        );
    }
}
