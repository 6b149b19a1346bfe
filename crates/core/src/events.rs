use serde::{Deserialize, Serialize};

/// What the remote agent is doing right now. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    #[default]
    Listening,
    Speaking,
    Thinking,
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self {
            AgentMode::Listening => "listening",
            AgentMode::Speaking => "speaking",
            AgentMode::Thinking => "thinking",
        };
        f.write_str(mode)
    }
}

/// Inbound events a conversation transport delivers to the controller.
///
/// This is the complete set; transports translate their own callbacks into
/// these variants so the controller's transition table stays exhaustive.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: Option<String> },
    Error(String),
    ModeChanged(AgentMode),
    /// The agent invoked a client-side tool.
    ToolCall { name: String, call_id: String },
}

/// One accelerometer reading, gravity included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Actions the user can take while a session is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Send the setting's bump instruction.
    Bump,
    /// End this session and start a new one.
    Restart,
    /// Go home / navigate away.
    Leave,
}
