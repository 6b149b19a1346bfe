use crate::audio::Base64EncodedAudioBytes;
use crate::tools::ClientToolResult;

/// Everything the client writes to the socket.
///
/// Audio chunks are the one message without a `type` tag, so the outer enum is
/// untagged and the remaining messages live in [`ClientMessage`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ClientEvent {
    UserAudioChunk(UserAudioChunkEvent),
    Message(ClientMessage),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "user_message")]
    UserMessage(UserMessageEvent),
    #[serde(rename = "contextual_update")]
    ContextualUpdate(ContextualUpdateEvent),
    #[serde(rename = "pong")]
    Pong(PongEvent),
    #[serde(rename = "client_tool_result")]
    ClientToolResult(ClientToolResult),
}

impl From<ClientMessage> for ClientEvent {
    fn from(message: ClientMessage) -> Self {
        ClientEvent::Message(message)
    }
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::UserAudioChunk(_) => "user_audio_chunk",
            ClientEvent::Message(ClientMessage::UserMessage(_)) => "user_message",
            ClientEvent::Message(ClientMessage::ContextualUpdate(_)) => "contextual_update",
            ClientEvent::Message(ClientMessage::Pong(_)) => "pong",
            ClientEvent::Message(ClientMessage::ClientToolResult(_)) => "client_tool_result",
        }
    }
}

/// `user_audio_chunk` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserAudioChunkEvent {
    /// Base64 PCM16 at the negotiated input rate
    user_audio_chunk: Base64EncodedAudioBytes,
}

impl UserAudioChunkEvent {
    pub fn new(audio: Base64EncodedAudioBytes) -> Self {
        Self {
            user_audio_chunk: audio,
        }
    }

    pub fn audio(&self) -> &Base64EncodedAudioBytes {
        &self.user_audio_chunk
    }
}

/// `user_message` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserMessageEvent {
    text: String,
}

impl UserMessageEvent {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// `contextual_update` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContextualUpdateEvent {
    text: String,
}

impl ContextualUpdateEvent {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// `pong` event, echoing the id of the ping it answers
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PongEvent {
    event_id: i64,
}

impl PongEvent {
    pub fn new(event_id: i64) -> Self {
        Self { event_id }
    }

    pub fn event_id(&self) -> i64 {
        self.event_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn audio_chunks_carry_no_type_tag() {
        let event = ClientEvent::UserAudioChunk(UserAudioChunkEvent::new("AAAA".to_string()));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({ "user_audio_chunk": "AAAA" }));
        assert_eq!(event.name(), "user_audio_chunk");
    }

    #[test]
    fn text_messages_are_tagged() {
        let event: ClientEvent =
            ClientMessage::ContextualUpdate(ContextualUpdateEvent::new("20 seconds left")).into();
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "contextual_update", "text": "20 seconds left" })
        );

        let event: ClientEvent = ClientMessage::UserMessage(UserMessageEvent::new("Hi")).into();
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "user_message", "text": "Hi" })
        );
    }

    #[test]
    fn pong_and_tool_result_match_the_wire_format() {
        let event: ClientEvent = ClientMessage::Pong(PongEvent::new(7)).into();
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "pong", "event_id": 7 })
        );

        let event: ClientEvent =
            ClientMessage::ClientToolResult(ClientToolResult::success("call_1", "ok")).into();
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "client_tool_result",
                "tool_call_id": "call_1",
                "result": "ok",
                "is_error": false
            })
        );
    }
}
