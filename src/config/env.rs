//! Environment variable loading.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ServerConfig, TlsConfig};

/// Read a variable, treating an empty value as unset.
fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {key} value '{raw}': {e}").into()),
        None => Ok(None),
    }
}

/// Split a comma-separated list, dropping blank entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build a configuration from defaults overlaid with environment variables.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    if let Some(host) = var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_var::<u16>("PORT")? {
        config.port = port;
    }

    config.tls = match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()),
    };

    if let Some(dir) = var("STATIC_DIR") {
        config.static_dir = PathBuf::from(dir);
    }

    config.openai_api_key = var("OPENAI_API_KEY");
    if let Some(model) = var("REALTIME_MODEL") {
        config.realtime_model = model;
    }
    if let Some(voice) = var("REALTIME_VOICE") {
        config.realtime_voice = voice;
    }
    config.realtime_url = var("REALTIME_URL");

    config.aci_api_key = var("ACI_API_KEY");
    if let Some(url) = var("ACI_BASE_URL") {
        config.aci_base_url = url;
    }
    if let Some(url) = var("ACI_LINK_ACCOUNT_URL") {
        config.aci_link_account_url = url;
    }
    if let Some(owner) = var("GITHUB_LINKED_ACCOUNT_OWNER_ID") {
        config.github_owner_id = owner;
    }
    if let Some(owner) = var("BRAVE_LINKED_ACCOUNT_OWNER_ID") {
        config.brave_owner_id = owner;
    }
    if let Some(owner) = var("SLACK_LINKED_ACCOUNT_OWNER_ID") {
        config.slack_owner_id = owner;
    }
    if let Some(owner) = var("GOOGLE_CALENDAR_LINKED_ACCOUNT_OWNER_ID") {
        config.google_calendar_owner_id = owner;
    }

    if let Some(threshold) = parse_var::<f64>("AUDIO_SILENCE_THRESHOLD")? {
        config.audio_silence_threshold = threshold;
    }
    if let Some(phrases) = var("OUTPUT_BLOCKED_PHRASES") {
        config.output_blocked_phrases = split_list(&phrases);
    }

    config.cors_allowed_origins = var("CORS_ALLOWED_ORIGINS");
    if let Some(rps) = parse_var::<u32>("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = parse_var::<u32>("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }
    config.max_websocket_connections = parse_var::<usize>("MAX_WEBSOCKET_CONNECTIONS")?;
    if let Some(per_ip) = parse_var::<u32>("MAX_CONNECTIONS_PER_IP")? {
        config.max_connections_per_ip = per_ip;
    }

    Ok(config)
}
