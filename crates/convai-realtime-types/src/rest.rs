//! Request and response bodies of the REST endpoints the client uses.

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SignedUrlResponse {
    pub signed_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VoicesResponse {
    #[serde(default)]
    pub voices: Vec<VoiceInfo>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentCreatedResponse {
    pub agent_id: String,
}

/// Prompt section of an agent definition.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PromptConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AgentSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TtsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ConversationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsSection>,
}

/// Body of `POST /v1/convai/agents/create`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateAgentRequest {
    pub conversation_config: ConversationConfig,
    pub name: String,
}

impl CreateAgentRequest {
    pub fn new(name: &str, instructions: &str, voice_id: &str, tool_ids: Vec<String>) -> Self {
        Self {
            conversation_config: ConversationConfig {
                agent: Some(AgentSection {
                    language: None,
                    prompt: PromptConfig {
                        prompt: Some(instructions.to_string()),
                        tool_ids: Some(tool_ids),
                    },
                }),
                tts: Some(TtsSection {
                    model_id: None,
                    voice_id: Some(voice_id.to_string()),
                }),
            },
            name: name.to_string(),
        }
    }
}

/// Body of `PATCH /v1/convai/agents/{agent_id}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UpdateAgentRequest {
    pub conversation_config: ConversationConfig,
}

impl UpdateAgentRequest {
    pub fn new(
        instructions: Option<String>,
        voice_id: Option<String>,
        language: &str,
        tts_model: &str,
        tool_ids: Vec<String>,
    ) -> Self {
        let tts = voice_id.map(|voice_id| TtsSection {
            model_id: Some(tts_model.to_string()),
            voice_id: Some(voice_id),
        });
        let agent = instructions.map(|prompt| AgentSection {
            language: Some(language.to_string()),
            prompt: PromptConfig {
                prompt: Some(prompt),
                tool_ids: Some(tool_ids),
            },
        });
        Self {
            conversation_config: ConversationConfig { agent, tts },
        }
    }
}
