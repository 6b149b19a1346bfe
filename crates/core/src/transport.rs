use crate::error::{CapabilityError, CredentialError};
use crate::events::{MotionSample, TransportEvent};
use crate::timer::END_CALL_TOOL;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

/// A signed URL that authorizes one conversation.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    signed_url: SecretString,
}

impl SessionCredential {
    pub fn new(signed_url: impl Into<String>) -> Self {
        Self {
            signed_url: SecretString::from(signed_url.into()),
        }
    }

    pub fn signed_url(&self) -> &str {
        self.signed_url.expose_secret()
    }
}

/// Both spellings the agent has been seen to use for hanging up.
pub fn is_end_call_tool(name: &str) -> bool {
    name == END_CALL_TOOL || name == END_CALL_TOOL.to_lowercase()
}

/// Issues signed session URLs for an agent.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn session_credential(&self, agent_id: &str) -> Result<SessionCredential, CredentialError>;
}

/// A bidirectional real-time channel to a remote voice agent.
///
/// Outbound sends are fire-and-forget: they enqueue and return without
/// waiting for the remote side. Inbound traffic arrives on the receiver
/// returned by [`ConversationTransport::start_session`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConversationTransport: Send {
    async fn start_session(
        &mut self,
        credential: &SessionCredential,
    ) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Closes the session. Closing an already closed session is a no-op.
    async fn end_session(&mut self) -> Result<()>;

    /// Sends text as if the user had said it.
    fn send_user_message(&mut self, text: &str) -> Result<()>;

    /// Sends background context the agent should take into account without
    /// treating it as a user turn.
    fn send_contextual_update(&mut self, text: &str) -> Result<()>;
}

/// Host platform capabilities a session needs.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Platform: Send {
    async fn request_audio_capability(&mut self) -> Result<(), CapabilityError>;

    /// One-time motion permission prompt. Ungated platforms return `true`.
    async fn request_motion_permission(&mut self) -> bool;

    /// Subscribes to motion samples. Dropping the receiver unsubscribes.
    fn motion_samples(&mut self) -> mpsc::Receiver<MotionSample>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_end_call_spellings_are_recognized() {
        assert!(is_end_call_tool("Avsluta"));
        assert!(is_end_call_tool("avsluta"));
        assert!(!is_end_call_tool("AVSLUTA"));
        assert!(!is_end_call_tool("hang_up"));
    }

    #[test]
    fn credential_debug_output_is_redacted() {
        let credential = SessionCredential::new("wss://example.test/convai?token=secret");
        assert_eq!(credential.signed_url(), "wss://example.test/convai?token=secret");
        assert!(!format!("{credential:?}").contains("token="));
    }
}
