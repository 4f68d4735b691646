use serde::Deserialize;
use std::path::PathBuf;

use super::{ServerConfig, TlsConfig};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   static_dir: "static"
///   tls:
///     enabled: true
///     cert_path: "/etc/ssl/cert.pem"
///     key_path: "/etc/ssl/key.pem"
///
/// realtime:
///   openai_api_key: "sk-..."
///   model: "gpt-4o-realtime-preview"
///   voice: "alloy"
///   silence_threshold: 0.8
///
/// tools:
///   aci_api_key: "your-aci-key"
///   aci_base_url: "https://api.aci.dev/v1"
///   link_account_url: "https://platform.aci.dev/linked-accounts"
///   linked_accounts:
///     github: "personaassis0"
///     slack: "slack_persona"
///
/// guardrails:
///   blocked_phrases:
///     - "internal only"
///
/// security:
///   cors_allowed_origins: "*"
///   rate_limit_requests_per_second: 60
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub tools: Option<ToolsYaml>,
    pub guardrails: Option<GuardrailsYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub static_dir: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Realtime model configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub openai_api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub url: Option<String>,
    /// Maximum fraction of zero samples in an accepted frame
    pub silence_threshold: Option<f64>,
}

/// Tool catalog configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ToolsYaml {
    pub aci_api_key: Option<String>,
    pub aci_base_url: Option<String>,
    pub link_account_url: Option<String>,
    pub linked_accounts: Option<LinkedAccountsYaml>,
}

/// Linked-account owner ids from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LinkedAccountsYaml {
    pub github: Option<String>,
    pub brave: Option<String>,
    pub slack: Option<String>,
    pub google_calendar: Option<String>,
}

/// Output guardrail configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GuardrailsYaml {
    pub blocked_phrases: Option<Vec<String>>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated or "*")
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
    /// Maximum concurrent WebSocket connections
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    pub max_connections_per_ip: Option<u32>,
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }

    /// Override `config` with every value present in this file
    pub fn apply_to(self, config: &mut ServerConfig) {
        if let Some(server) = self.server {
            set(&mut config.host, server.host);
            set(&mut config.port, server.port);
            set(&mut config.static_dir, server.static_dir.map(PathBuf::from));
            if let Some(tls) = server.tls {
                match (tls.enabled, tls.cert_path, tls.key_path) {
                    (Some(false), _, _) => config.tls = None,
                    (_, Some(cert), Some(key)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        })
                    }
                    _ => {}
                }
            }
        }

        if let Some(realtime) = self.realtime {
            if realtime.openai_api_key.is_some() {
                config.openai_api_key = realtime.openai_api_key;
            }
            set(&mut config.realtime_model, realtime.model);
            set(&mut config.realtime_voice, realtime.voice);
            if realtime.url.is_some() {
                config.realtime_url = realtime.url;
            }
            set(&mut config.audio_silence_threshold, realtime.silence_threshold);
        }

        if let Some(tools) = self.tools {
            if tools.aci_api_key.is_some() {
                config.aci_api_key = tools.aci_api_key;
            }
            set(&mut config.aci_base_url, tools.aci_base_url);
            set(&mut config.aci_link_account_url, tools.link_account_url);
            if let Some(accounts) = tools.linked_accounts {
                set(&mut config.github_owner_id, accounts.github);
                set(&mut config.brave_owner_id, accounts.brave);
                set(&mut config.slack_owner_id, accounts.slack);
                set(&mut config.google_calendar_owner_id, accounts.google_calendar);
            }
        }

        if let Some(guardrails) = self.guardrails
            && let Some(phrases) = guardrails.blocked_phrases
        {
            config.output_blocked_phrases = phrases
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }

        if let Some(security) = self.security {
            if security.cors_allowed_origins.is_some() {
                config.cors_allowed_origins = security.cors_allowed_origins;
            }
            set(
                &mut config.rate_limit_requests_per_second,
                security.rate_limit_requests_per_second,
            );
            set(&mut config.rate_limit_burst_size, security.rate_limit_burst_size);
            if security.max_websocket_connections.is_some() {
                config.max_websocket_connections = security.max_websocket_connections;
            }
            set(&mut config.max_connections_per_ip, security.max_connections_per_ip);
        }
    }
}
