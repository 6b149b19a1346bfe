/// Base64 encoded little-endian PCM16 audio.
pub type Base64EncodedAudioBytes = String;

/// Audio formats negotiated in the initiation metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "pcm_8000")]
    Pcm8000,
    #[serde(rename = "pcm_16000")]
    Pcm16000,
    #[serde(rename = "pcm_22050")]
    Pcm22050,
    #[serde(rename = "pcm_24000")]
    Pcm24000,
    #[serde(rename = "pcm_44100")]
    Pcm44100,
    #[serde(rename = "pcm_48000")]
    Pcm48000,
    #[serde(rename = "ulaw_8000")]
    Ulaw8000,
}

impl AudioFormat {
    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        match self {
            AudioFormat::Pcm8000 => 8_000,
            AudioFormat::Pcm16000 => 16_000,
            AudioFormat::Pcm22050 => 22_050,
            AudioFormat::Pcm24000 => 24_000,
            AudioFormat::Pcm44100 => 44_100,
            AudioFormat::Pcm48000 => 48_000,
            AudioFormat::Ulaw8000 => 8_000,
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::Pcm16000
    }
}
