use std::time::Duration;

pub const BASE_URL: &str = "https://api.elevenlabs.io";

pub const API_KEY_HEADER: &str = "xi-api-key";

pub const SIGNED_URL_PATH: &str = "/v1/convai/conversation/get-signed-url";
pub const VOICES_PATH: &str = "/v1/voices";
pub const CREATE_AGENT_PATH: &str = "/v1/convai/agents/create";
pub const AGENTS_PATH: &str = "/v1/convai/agents";

pub const DEFAULT_LANGUAGE: &str = "sv";
pub const DEFAULT_TTS_MODEL: &str = "eleven_flash_v2_5";

pub const DEFAULT_CAPACITY: usize = 1024;

/// Upper bound on one REST call, body included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on the websocket handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
