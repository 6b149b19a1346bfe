//! Application Configuration Module
//!
//! Loads settings from the environment (and `.env`) into one struct that is
//! handed to the rest of the service.

use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use tracing::Level;

// --- Application Constants ---

/// The size of each audio chunk sent from the microphone input stream.
pub const INPUT_CHUNK_SIZE: usize = 1024;
/// The size of each audio chunk for the audio output stream.
pub const OUTPUT_CHUNK_SIZE: usize = 1024;
/// Capacity of the speaker buffer. Agent audio arrives faster than real time.
pub const OUTPUT_BUFFER_MS: usize = 30_000;

pub const DEFAULT_API_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";
pub const DEFAULT_AGENT_LANGUAGE: &str = "sv";

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Missing keys are not fatal here: settings can still be browsed, and a
    /// play session reports the missing key itself.
    pub api_key: Option<SecretString>,
    pub api_url: String,
    pub settings_path: PathBuf,
    pub agent_tool_ids: Vec<String>,
    pub agent_language: String,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `ELEVENLABS_API_KEY`: Secret key for the voice service.
    // *   `ELEVENLABS_API_URL`: (Optional) REST base URL.
    // *   `BLOOM_SETTINGS_PATH`: (Optional) JSON file holding the settings. Defaults to "settings.json".
    // *   `BLOOM_AGENT_TOOL_IDS`: (Optional) Comma separated tool ids attached to provisioned agents.
    // *   `BLOOM_AGENT_LANGUAGE`: (Optional) Agent language. Defaults to "sv".
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = non_empty("ELEVENLABS_API_KEY").map(SecretString::from);
        let api_url = non_empty("ELEVENLABS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let settings_path = non_empty("BLOOM_SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
        let agent_tool_ids = non_empty("BLOOM_AGENT_TOOL_IDS")
            .map(|ids| {
                ids.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let agent_language =
            non_empty("BLOOM_AGENT_LANGUAGE").unwrap_or_else(|| DEFAULT_AGENT_LANGUAGE.to_string());

        let log_level_str = non_empty("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            api_key,
            api_url,
            settings_path,
            agent_tool_ids,
            agent_language,
            log_level,
        })
    }

    /// REST client settings for the voice service.
    pub fn rest_config(&self) -> convai_realtime::Config {
        let mut builder = convai_realtime::Config::builder()
            .with_base_url(&self.api_url)
            .with_language(&self.agent_language)
            .with_tool_ids(self.agent_tool_ids.clone());
        if let Some(api_key) = &self.api_key {
            builder = builder.with_api_key(api_key.clone());
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.settings_path, PathBuf::from("settings.json"));
        assert!(config.agent_tool_ids.is_empty());
        assert_eq!(config.agent_language, "sv");
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.rest_config().api_key().is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            ("ELEVENLABS_API_KEY", "xi-123"),
            ("ELEVENLABS_API_URL", "http://localhost:8080/"),
            ("BLOOM_SETTINGS_PATH", "/tmp/bloom.json"),
            ("BLOOM_AGENT_TOOL_IDS", "end_call, , weather "),
            ("BLOOM_AGENT_LANGUAGE", "en"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(
            config.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("xi-123".to_string())
        );
        assert_eq!(config.agent_tool_ids, vec!["end_call", "weather"]);
        assert_eq!(config.log_level, Level::DEBUG);

        let rest = config.rest_config();
        assert_eq!(rest.base_url(), "http://localhost:8080");
        assert_eq!(rest.language(), "en");
        assert!(rest.api_key().is_some());
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = load(&[("ELEVENLABS_API_KEY", "   ")]).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let err = load(&[("RUST_LOG", "chatty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(ref level) if level == "chatty"));
    }
}
