//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `realtime` - Browser WebSocket bridged to a realtime session
//! - `static_files` - Browser client page and assets

pub mod api;
pub mod realtime;
pub mod static_files;

pub use realtime::ws_handler;
