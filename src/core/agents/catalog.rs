//! The assistant's agent graph.
//!
//! A triage `Assistant` hands off to one specialist per connected app. Each
//! specialist's tools are catalog functions bound to that app's linked-account
//! owner.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use super::agent::RealtimeAgent;
use super::guardrail::OutputGuardrail;
use crate::core::tools::{AciClient, AciTool, Tool};

/// Name of the agent every session starts with.
pub const ROOT_AGENT_NAME: &str = "Assistant";

const ROOT_INSTRUCTIONS: &str = "You are an assistant that only understands and responds in English. \
Do not respond in any other language. You can use tools to answer questions. \
If you don't know the answer, say 'I don't know'.";

/// Linked-account owner per connected app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccounts {
    pub github: String,
    pub brave: String,
    pub slack: String,
    pub google_calendar: String,
}

impl Default for LinkedAccounts {
    fn default() -> Self {
        Self {
            github: "personaassis0".to_string(),
            brave: "brave persona".to_string(),
            slack: "slack_persona".to_string(),
            google_calendar: "google persona".to_string(),
        }
    }
}

/// Static description of one specialist agent.
#[derive(Debug, Clone, Copy)]
pub struct SpecialistSpec {
    pub name: &'static str,
    pub instructions: &'static str,
    pub functions: &'static [&'static str],
}

pub const GITHUB_ASSISTANT: SpecialistSpec = SpecialistSpec {
    name: "Github Assistant",
    instructions: "You are a Github assistant that only understands and responds in English for GitHub issues. \
Do not respond to any other language. Do not transcribe and translate.",
    functions: &[
        "GITHUB__LIST_REPOSITORIES",
        "GITHUB__LIST_ISSUES",
        "GITHUB__CREATE_ISSUE",
        "GITHUB__CREATE_ISSUE_COMMENT",
        "GITHUB__CREATE_PULL_REQUEST",
    ],
};

pub const BRAVE_ASSISTANT: SpecialistSpec = SpecialistSpec {
    name: "Brave Assistant",
    instructions: "You are a Brave Web assistant that only understands and responds in English. \
Help with web search queries. Do not respond to any other language. Do not transcribe and translate.",
    functions: &["BRAVE_SEARCH__WEB_SEARCH"],
};

pub const SLACK_ASSISTANT: SpecialistSpec = SpecialistSpec {
    name: "Slack Assistant",
    instructions: "You are a Slack assistant that only understands and responds in English for Slack issues. \
Help with Slack related queries. Do not respond to any other language. Do not transcribe and translate.",
    functions: &["SLACK__USERS_LIST", "SLACK__CHAT_POST_MESSAGE"],
};

pub const GOOGLE_CALENDAR_ASSISTANT: SpecialistSpec = SpecialistSpec {
    name: "Google Calendar Assistant",
    instructions: "You are a Google Calendar assistant that only understands and responds in English for Google Calendar issues. \
Help with Google Calendar related queries. Do not respond to any other language. Do not transcribe and translate.",
    functions: &[
        "GOOGLE_CALENDAR__EVENTS_INSERT",
        "GOOGLE_CALENDAR__EVENTS_LIST",
    ],
};

/// Build the agent graph, resolving catalog tools when a client is available.
///
/// Functions whose definitions fail to load are skipped with a warning, so a
/// partially reachable catalog still yields a working assistant.
pub async fn build_agent_graph(
    aci: Option<Arc<AciClient>>,
    accounts: &LinkedAccounts,
    guardrails: Vec<Arc<dyn OutputGuardrail>>,
) -> Arc<RealtimeAgent> {
    if aci.is_none() {
        warn!("No tool catalog configured; specialist agents will run without tools");
    }

    let specialists = [
        (GITHUB_ASSISTANT, accounts.github.as_str()),
        (SLACK_ASSISTANT, accounts.slack.as_str()),
        (BRAVE_ASSISTANT, accounts.brave.as_str()),
        (GOOGLE_CALENDAR_ASSISTANT, accounts.google_calendar.as_str()),
    ];

    let mut handoffs = Vec::with_capacity(specialists.len());
    for (spec, owner_id) in specialists {
        let tools = match &aci {
            Some(client) => load_tools(client, spec.functions, owner_id).await,
            None => Vec::new(),
        };
        info!(
            agent = spec.name,
            tools = tools.len(),
            "Built specialist agent"
        );
        handoffs.push(Arc::new(
            RealtimeAgent::new(spec.name, spec.instructions)
                .with_tools(tools)
                .with_output_guardrails(guardrails.clone()),
        ));
    }

    Arc::new(
        RealtimeAgent::new(ROOT_AGENT_NAME, ROOT_INSTRUCTIONS)
            .with_handoffs(handoffs)
            .with_output_guardrails(guardrails),
    )
}

async fn load_tools(
    client: &Arc<AciClient>,
    functions: &[&str],
    owner_id: &str,
) -> Vec<Arc<dyn Tool>> {
    let results = join_all(
        functions
            .iter()
            .map(|name| AciTool::load(client.clone(), name, owner_id)),
    )
    .await;

    functions
        .iter()
        .zip(results)
        .filter_map(|(name, result)| match result {
            Ok(tool) => Some(Arc::new(tool) as Arc<dyn Tool>),
            Err(e) => {
                warn!(function = %name, "Skipping tool: {}", e);
                None
            }
        })
        .collect()
}
