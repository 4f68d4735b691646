//! Tool catalog module.
//!
//! Tools are external actions the realtime session may call mid-conversation.
//! The [`Tool`] trait is the seam the session driver depends on; [`AciTool`]
//! implements it over the ACI function-calling API.

mod aci;
mod base;

pub use aci::{ACI_DEFAULT_BASE_URL, AciClient, AciTool, FunctionExecutionResult};
pub use base::{
    FunctionDefinition, Tool, ToolError, ToolResult, app_name_of, empty_object_schema,
    parse_arguments,
};
