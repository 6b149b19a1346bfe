use crate::audio::{AudioFormat, Base64EncodedAudioBytes};
use crate::tools::ClientToolCall;

/// Everything the server sends, plus the synthetic `close` the client emits
/// when the socket goes away.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "conversation_initiation_metadata")]
    ConversationInitiationMetadata {
        conversation_initiation_metadata_event: InitiationMetadata,
    },
    #[serde(rename = "ping")]
    Ping { ping_event: Ping },
    #[serde(rename = "audio")]
    Audio { audio_event: AudioChunk },
    #[serde(rename = "agent_response")]
    AgentResponse {
        agent_response_event: AgentResponse,
    },
    #[serde(rename = "user_transcript")]
    UserTranscript {
        user_transcription_event: UserTranscript,
    },
    #[serde(rename = "interruption")]
    Interruption {
        #[serde(default)]
        interruption_event: Interruption,
    },
    #[serde(rename = "client_tool_call")]
    ClientToolCall { client_tool_call: ClientToolCall },
    #[serde(rename = "vad_score")]
    VadScore { vad_score_event: VadScore },
    /// Synthetic: the socket closed.
    #[serde(rename = "close")]
    Close { reason: Option<String> },
    /// Synthetic: reading from the socket failed.
    #[serde(rename = "error")]
    Error { message: String },
    /// Event types this client does not model.
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConversationInitiationMetadata { .. } => "conversation_initiation_metadata",
            ServerEvent::Ping { .. } => "ping",
            ServerEvent::Audio { .. } => "audio",
            ServerEvent::AgentResponse { .. } => "agent_response",
            ServerEvent::UserTranscript { .. } => "user_transcript",
            ServerEvent::Interruption { .. } => "interruption",
            ServerEvent::ClientToolCall { .. } => "client_tool_call",
            ServerEvent::VadScore { .. } => "vad_score",
            ServerEvent::Close { .. } => "close",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InitiationMetadata {
    conversation_id: String,
    #[serde(default)]
    agent_output_audio_format: AudioFormat,
    #[serde(default)]
    user_input_audio_format: AudioFormat,
}

impl InitiationMetadata {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn agent_output_audio_format(&self) -> AudioFormat {
        self.agent_output_audio_format
    }

    pub fn user_input_audio_format(&self) -> AudioFormat {
        self.user_input_audio_format
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Ping {
    event_id: i64,
    #[serde(default)]
    ping_ms: Option<u64>,
}

impl Ping {
    pub fn event_id(&self) -> i64 {
        self.event_id
    }

    /// Delay the server asks for before answering.
    pub fn ping_ms(&self) -> Option<u64> {
        self.ping_ms
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioChunk {
    audio_base_64: Base64EncodedAudioBytes,
    #[serde(default)]
    event_id: i64,
}

impl AudioChunk {
    pub fn audio(&self) -> &Base64EncodedAudioBytes {
        &self.audio_base_64
    }

    pub fn event_id(&self) -> i64 {
        self.event_id
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentResponse {
    agent_response: String,
}

impl AgentResponse {
    pub fn text(&self) -> &str {
        &self.agent_response
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserTranscript {
    user_transcript: String,
}

impl UserTranscript {
    pub fn text(&self) -> &str {
        &self.user_transcript
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Interruption {
    #[serde(default)]
    event_id: i64,
    #[serde(default)]
    reason: Option<String>,
}

impl Interruption {
    pub fn event_id(&self) -> i64 {
        self.event_id
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VadScore {
    vad_score: f32,
}

impl VadScore {
    pub fn score(&self) -> f32 {
        self.vad_score
    }
}
