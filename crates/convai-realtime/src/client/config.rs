use super::consts;
use secrecy::SecretString;
use std::time::Duration;

/// REST settings for the voice service.
#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    api_key: Option<SecretString>,
    language: String,
    tts_model: String,
    tool_ids: Vec<String>,
    request_timeout: Duration,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.config.api_key = Some(api_key);
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.config.language = language.to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn with_tool_ids(mut self, tool_ids: Vec<String>) -> Self {
        self.config.tool_ids = tool_ids;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: consts::BASE_URL.to_string(),
            api_key: None,
            language: consts::DEFAULT_LANGUAGE.to_string(),
            tts_model: consts::DEFAULT_TTS_MODEL.to_string(),
            tool_ids: Vec::new(),
            request_timeout: consts::REQUEST_TIMEOUT,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn tts_model(&self) -> &str {
        &self.tts_model
    }

    pub fn tool_ids(&self) -> &[String] {
        &self.tool_ids
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
