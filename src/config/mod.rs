//! Configuration module for the voice relay gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading and overrides
//!
//! # Example
//! ```rust,no_run
//! use voice_relay_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod yaml;

use crate::core::agents::LinkedAccounts;
use crate::core::audio_gate::DEFAULT_SILENCE_THRESHOLD;
use crate::core::bridge::DEFAULT_LINK_ACCOUNT_URL;
use crate::core::realtime::RealtimeConfig;
use crate::core::realtime::openai::realtime_voice_or_default;
use crate::core::tools::ACI_DEFAULT_BASE_URL;

pub use yaml::YamlConfig;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, TLS, static files)
/// - Realtime model settings (OpenAI key, model, voice)
/// - Tool catalog settings (ACI key, linked-account owners)
/// - Audio gating and output guardrails
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Directory served at `/` and as the static fallback
    pub static_dir: PathBuf,

    // Realtime model
    /// OpenAI API key for the Realtime API
    pub openai_api_key: Option<String>,
    pub realtime_model: String,
    pub realtime_voice: String,
    /// Override for the realtime WebSocket endpoint
    pub realtime_url: Option<String>,

    // Tool catalog
    /// ACI API key; without it agents run with no catalog tools
    pub aci_api_key: Option<String>,
    pub aci_base_url: String,
    /// Page users are sent to when a tool needs an unlinked account
    pub aci_link_account_url: String,
    pub github_owner_id: String,
    pub brave_owner_id: String,
    pub slack_owner_id: String,
    pub google_calendar_owner_id: String,

    // Audio and output policy
    /// Frames with a larger fraction of zero samples are dropped
    pub audio_silence_threshold: f64,
    /// Assistant transcripts containing any of these phrases trip the guardrail
    pub output_blocked_phrases: Vec<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let accounts = LinkedAccounts::default();
        let realtime = RealtimeConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tls: None,
            static_dir: PathBuf::from("static"),
            openai_api_key: None,
            realtime_model: realtime.model.clone(),
            realtime_voice: realtime.voice.clone(),
            realtime_url: None,
            aci_api_key: None,
            aci_base_url: ACI_DEFAULT_BASE_URL.to_string(),
            aci_link_account_url: DEFAULT_LINK_ACCOUNT_URL.to_string(),
            github_owner_id: accounts.github,
            brave_owner_id: accounts.brave,
            slack_owner_id: accounts.slack,
            google_calendar_owner_id: accounts.google_calendar,
            audio_silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            output_blocked_phrases: Vec::new(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.aci_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded into the process environment in main.rs
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = env::load_from_env()?;
        yaml_config.apply_to(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the merged configuration for values the server cannot run with
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self
            .openai_api_key
            .as_deref()
            .is_none_or(|key| key.trim().is_empty())
        {
            return Err("OPENAI_API_KEY is required".into());
        }

        if self.port == 0 {
            return Err("PORT must be between 1 and 65535".into());
        }

        if !(0.0..=1.0).contains(&self.audio_silence_threshold) {
            return Err(format!(
                "AUDIO_SILENCE_THRESHOLD must be between 0 and 1, got {}",
                self.audio_silence_threshold
            )
            .into());
        }

        if let Some(tls) = &self.tls {
            if !tls.cert_path.exists() {
                return Err(format!(
                    "TLS certificate not found: {}",
                    tls.cert_path.display()
                )
                .into());
            }
            if !tls.key_path.exists() {
                return Err(format!("TLS key not found: {}", tls.key_path.display()).into());
            }
        }

        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Session configuration handed to the realtime runtime
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            model: self.realtime_model.clone(),
            voice: realtime_voice_or_default(&self.realtime_voice).to_string(),
            ..Default::default()
        }
    }

    /// Linked-account owner per connected app
    pub fn linked_accounts(&self) -> LinkedAccounts {
        LinkedAccounts {
            github: self.github_owner_id.clone(),
            brave: self.brave_owner_id.clone(),
            slack: self.slack_owner_id.clone(),
            google_calendar: self.google_calendar_owner_id.clone(),
        }
    }
}
