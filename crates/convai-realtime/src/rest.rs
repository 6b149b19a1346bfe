use crate::client::config::Config;
use crate::client::consts;
use crate::types::rest::{
    AgentCreatedResponse, CreateAgentRequest, SignedUrlResponse, UpdateAgentRequest, VoiceInfo,
    VoicesResponse,
};
use anyhow::{Context, Result, anyhow, bail};
use secrecy::{ExposeSecret, SecretString};

/// Voice service REST calls authorized with the `xi-api-key` header.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    config: Config,
}

impl RestClient {
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client, falling back to defaults: {e}");
                reqwest::Client::new()
            });
        Self { http, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn has_api_key(&self) -> bool {
        self.config.api_key().is_some()
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key()
            .map(|key| key.expose_secret())
            .ok_or_else(|| anyhow!("API key is not configured"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    /// Fetches a one-time websocket URL for a conversation with `agent_id`.
    pub async fn get_signed_url(&self, agent_id: &str) -> Result<SecretString> {
        let response = self
            .http
            .get(self.url(consts::SIGNED_URL_PATH))
            .query(&[("agent_id", agent_id)])
            .header(consts::API_KEY_HEADER, self.api_key()?)
            .send()
            .await
            .context("signed url request failed")?;
        let body: SignedUrlResponse = check(response).await?.json().await?;
        Ok(SecretString::from(body.signed_url))
    }

    pub async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        let response = self
            .http
            .get(self.url(consts::VOICES_PATH))
            .header(consts::API_KEY_HEADER, self.api_key()?)
            .send()
            .await
            .context("voices request failed")?;
        let body: VoicesResponse = check(response).await?.json().await?;
        Ok(body.voices)
    }

    /// Creates an agent and returns its id.
    pub async fn create_agent(&self, name: &str, instructions: &str, voice_id: &str) -> Result<String> {
        let body = CreateAgentRequest::new(
            name,
            instructions,
            voice_id,
            self.config.tool_ids().to_vec(),
        );
        let response = self
            .http
            .post(self.url(consts::CREATE_AGENT_PATH))
            .header(consts::API_KEY_HEADER, self.api_key()?)
            .json(&body)
            .send()
            .await
            .context("create agent request failed")?;
        let created: AgentCreatedResponse = check(response).await?.json().await?;
        tracing::info!(agent_id = %created.agent_id, %name, "agent created");
        Ok(created.agent_id)
    }

    /// Pushes a new prompt and/or voice to an existing agent.
    pub async fn update_agent(
        &self,
        agent_id: &str,
        instructions: Option<String>,
        voice_id: Option<String>,
    ) -> Result<()> {
        if instructions.is_none() && voice_id.is_none() {
            return Ok(());
        }
        let body = UpdateAgentRequest::new(
            instructions,
            voice_id,
            self.config.language(),
            self.config.tts_model(),
            self.config.tool_ids().to_vec(),
        );
        let response = self
            .http
            .patch(self.url(&format!("{}/{}", consts::AGENTS_PATH, agent_id)))
            .header(consts::API_KEY_HEADER, self.api_key()?)
            .json(&body)
            .send()
            .await
            .context("update agent request failed")?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!(%status, %body, "voice service request failed");
    bail!("voice service returned {status}: {body}")
}
