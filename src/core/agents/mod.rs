//! Agent graph module.
//!
//! Agents bundle instructions, tools and handoff targets. The realtime session
//! driver exposes the current agent's tools to the model and swaps agents when
//! the model calls a `transfer_to_<agent>` handoff tool.

mod agent;
mod catalog;
mod guardrail;

pub use agent::{HANDOFF_TOOL_PREFIX, RealtimeAgent};
pub use catalog::{
    BRAVE_ASSISTANT, GITHUB_ASSISTANT, GOOGLE_CALENDAR_ASSISTANT, LinkedAccounts, ROOT_AGENT_NAME,
    SLACK_ASSISTANT, SpecialistSpec, build_agent_graph,
};
pub use guardrail::{
    BlockedPhraseGuardrail, GuardrailOutput, OutputGuardrail, run_output_guardrails,
};
