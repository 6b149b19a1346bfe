//! Error taxonomy for a play session.
//!
//! Every failure the controller can meet while connecting is folded into a
//! [`SessionError`] so the host only ever has one type to display.

/// Why the microphone could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("Microphone capture is not supported on this system.")]
    Unsupported,
    #[error("Microphone permission was denied. Please allow microphone access and try again.")]
    PermissionDenied,
    #[error("No microphone found. Please connect a microphone and try again.")]
    DeviceNotFound,
    #[error("{0}")]
    Other(String),
}

/// Failure to obtain a signed session URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// The upstream API key is missing.
    #[error("voice service API key is not configured")]
    NotConfigured,
    /// The remote call failed.
    #[error("{0}")]
    Request(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("The voice service is not configured. Ask an administrator to set the API key.")]
    Configuration,
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error("Failed to get signed URL: {0}")]
    Credential(String),
    #[error("Conversation error: {0}")]
    Transport(String),
}

impl From<CredentialError> for SessionError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotConfigured => SessionError::Configuration,
            CredentialError::Request(message) => SessionError::Credential(message),
        }
    }
}
