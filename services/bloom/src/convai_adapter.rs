//! Binds the core session traits to the voice service.

use crate::audio::{AudioGuard, MicFeed, Playback};
use crate::config::INPUT_CHUNK_SIZE;
use crate::platform::AudioSlot;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bloom_core::catalog::{AgentProvisioner, Voice, VoiceCatalog};
use bloom_core::transport::{ConversationTransport, CredentialProvider, SessionCredential};
use bloom_core::{AgentMode, CredentialError, TransportEvent};
use bloom_native_utils::audio::{CONVAI_PCM16_SAMPLE_RATE, create_resampler, decode, encode, split_for_chunks};
use convai_realtime::types::events::client::{ClientMessage, UserAudioChunkEvent};
use convai_realtime::types::{ClientEvent, ClientToolResult, ServerEvent};
use convai_realtime::{Client, ClientTx, RestClient, ServerRx};
use ringbuf::HeapProd;
use ringbuf::traits::Producer;
use rubato::{FastFixedIn, Resampler};
use secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 128;
/// Frames per resampler pass for agent audio.
const OUTPUT_RESAMPLE_CHUNK: usize = 100;

/// REST-backed credentials, voice catalog and agent provisioning.
#[derive(Clone)]
pub struct ConvaiServices {
    rest: RestClient,
}

impl ConvaiServices {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl CredentialProvider for ConvaiServices {
    async fn session_credential(&self, agent_id: &str) -> Result<SessionCredential, CredentialError> {
        if !self.rest.has_api_key() {
            return Err(CredentialError::NotConfigured);
        }
        let signed_url = self
            .rest
            .get_signed_url(agent_id)
            .await
            .map_err(|e| CredentialError::Request(format!("{e:#}")))?;
        Ok(SessionCredential::new(signed_url.expose_secret()))
    }
}

#[async_trait]
impl VoiceCatalog for ConvaiServices {
    async fn voices(&self) -> Result<Vec<Voice>> {
        let voices = self.rest.list_voices().await.context("Failed to fetch voices")?;
        Ok(voices
            .into_iter()
            .map(|voice| Voice {
                voice_id: voice.voice_id,
                name: voice.name,
                description: voice.description,
            })
            .collect())
    }
}

#[async_trait]
impl AgentProvisioner for ConvaiServices {
    async fn create_agent(&self, name: &str, instructions: &str, voice_id: &str) -> Result<String> {
        self.rest.create_agent(name, instructions, voice_id).await
    }

    async fn update_agent(
        &self,
        agent_id: &str,
        instructions: Option<String>,
        voice_id: Option<String>,
    ) -> Result<()> {
        self.rest.update_agent(agent_id, instructions, voice_id).await
    }
}

/// A conversation over the voice service websocket, with the platform's
/// microphone and speaker attached when available.
pub struct ConvaiTransport {
    audio: AudioSlot,
    client: Option<Client>,
    tasks: Vec<JoinHandle<()>>,
    guard: Option<AudioGuard>,
}

impl ConvaiTransport {
    pub fn new(audio: AudioSlot) -> Self {
        Self {
            audio,
            client: None,
            tasks: Vec::new(),
            guard: None,
        }
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or_else(|| anyhow!("no conversation in progress"))
    }
}

#[async_trait]
impl ConversationTransport for ConvaiTransport {
    async fn start_session(
        &mut self,
        credential: &SessionCredential,
    ) -> Result<mpsc::Receiver<TransportEvent>> {
        if self.client.is_some() {
            return Err(anyhow!("conversation already started"));
        }
        let signed_url = SecretString::from(credential.signed_url().to_string());
        let mut client = convai_realtime::connect(&signed_url)
            .await
            .context("Failed to connect to the voice service")?;
        let server_rx = client.server_events()?;
        let client_tx = client.sender()?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let speaking = Arc::new(AtomicBool::new(false));

        let audio = self.audio.lock().ok().and_then(|mut slot| slot.take());
        let (speaker, playback) = match audio {
            Some(io) => {
                self.guard = Some(io.guard);
                self.tasks.push(tokio::spawn(pump_microphone(
                    io.mic,
                    client_tx.clone(),
                    speaking.clone(),
                )));
                let speaker = SpeakerSink::new(io.speaker.samples, io.speaker.sample_rate);
                (Some(speaker), Some(io.speaker.playback))
            }
            None => {
                tracing::warn!("no audio streams available, conversation is text only");
                (None, None)
            }
        };

        let pump = EventPump {
            server_rx,
            client_tx,
            events: event_tx,
            speaker,
            playback,
            speaking,
            mode: AgentMode::Listening,
        };
        self.tasks.push(tokio::spawn(pump.run()));
        self.client = Some(client);
        tracing::info!("conversation socket open");
        Ok(event_rx)
    }

    async fn end_session(&mut self) -> Result<()> {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(mut client) = self.client.take() {
            if let Ok(stats) = client.stats() {
                tracing::info!(
                    received = stats.events_received(),
                    sent = stats.events_sent(),
                    audio_chunks = stats.audio_chunks_received(),
                    "conversation closed"
                );
            }
            client.disconnect();
        }
        self.guard = None;
        Ok(())
    }

    fn send_user_message(&mut self, text: &str) -> Result<()> {
        self.client()?.send_user_message(text)
    }

    fn send_contextual_update(&mut self, text: &str) -> Result<()> {
        self.client()?.send_contextual_update(text)
    }
}

/// Decodes agent audio and queues it for the speaker at the device rate.
struct SpeakerSink {
    samples: HeapProd<f32>,
    output_rate: u32,
    source_rate: u32,
    resampler: Option<FastFixedIn<f32>>,
}

impl SpeakerSink {
    fn new(samples: HeapProd<f32>, output_rate: u32) -> Self {
        let mut sink = Self {
            samples,
            output_rate,
            source_rate: 0,
            resampler: None,
        };
        sink.set_source_rate(CONVAI_PCM16_SAMPLE_RATE as u32);
        sink
    }

    fn set_source_rate(&mut self, rate: u32) {
        if rate == self.source_rate {
            return;
        }
        self.source_rate = rate;
        self.resampler = match create_resampler(rate as f64, self.output_rate as f64, OUTPUT_RESAMPLE_CHUNK) {
            Ok(resampler) => Some(resampler),
            Err(e) => {
                tracing::error!("Failed to create output resampler: {e:#}");
                None
            }
        };
    }

    fn push(&mut self, audio: &str) {
        let Some(resampler) = self.resampler.as_mut() else {
            return;
        };
        let decoded = decode(audio);
        let chunk_size = resampler.input_frames_next();
        for chunk in split_for_chunks(&decoded, chunk_size) {
            let Ok(resampled) = resampler.process(&[chunk.as_slice()], None) else {
                continue;
            };
            let Some(channel) = resampled.first() else {
                continue;
            };
            let pushed = self.samples.push_slice(channel);
            if pushed < channel.len() {
                tracing::warn!("Speaker buffer full, dropped {} samples", channel.len() - pushed);
                return;
            }
        }
    }
}

enum PumpInput {
    Server(Result<ServerEvent, RecvError>),
    Playback(Playback),
}

/// Translates server events into transport events, feeds the speaker and
/// acknowledges client tool calls.
struct EventPump {
    server_rx: ServerRx,
    client_tx: ClientTx,
    events: mpsc::Sender<TransportEvent>,
    speaker: Option<SpeakerSink>,
    playback: Option<mpsc::Receiver<Playback>>,
    speaking: Arc<AtomicBool>,
    mode: AgentMode,
}

impl EventPump {
    async fn run(mut self) {
        loop {
            let input = tokio::select! {
                event = self.server_rx.recv() => PumpInput::Server(event),
                Some(state) = next_playback(&mut self.playback) => PumpInput::Playback(state),
            };
            let keep_going = match input {
                PumpInput::Server(Ok(event)) => self.on_server_event(event).await,
                PumpInput::Server(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!("event pump lagged, skipped {skipped} events");
                    true
                }
                PumpInput::Server(Err(RecvError::Closed)) => false,
                PumpInput::Playback(Playback::Drained) if self.mode == AgentMode::Speaking => {
                    self.set_mode(AgentMode::Listening).await
                }
                PumpInput::Playback(_) => true,
            };
            if !keep_going {
                break;
            }
        }
        tracing::debug!("event pump stopped");
    }

    /// Returns `false` once the conversation is over or nobody is listening.
    async fn on_server_event(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::ConversationInitiationMetadata {
                conversation_initiation_metadata_event: meta,
            } => {
                tracing::info!(conversation_id = meta.conversation_id(), "conversation started");
                if let Some(speaker) = self.speaker.as_mut() {
                    speaker.set_source_rate(meta.agent_output_audio_format().sample_rate());
                }
                self.emit(TransportEvent::Connected).await
            }
            ServerEvent::Audio { audio_event } => {
                if let Some(speaker) = self.speaker.as_mut() {
                    speaker.push(audio_event.audio());
                }
                self.set_mode(AgentMode::Speaking).await
            }
            ServerEvent::UserTranscript {
                user_transcription_event,
            } => {
                tracing::info!("User said: {:?}", user_transcription_event.text());
                self.set_mode(AgentMode::Thinking).await
            }
            ServerEvent::AgentResponse {
                agent_response_event,
            } => {
                tracing::info!("Agent said: {:?}", agent_response_event.text());
                true
            }
            ServerEvent::Interruption { .. } => self.set_mode(AgentMode::Listening).await,
            ServerEvent::ClientToolCall { client_tool_call } => {
                let call_id = client_tool_call.tool_call_id().to_string();
                let ack = ClientEvent::from(ClientMessage::ClientToolResult(
                    ClientToolResult::success(&call_id, "ok"),
                ));
                if let Err(e) = self.client_tx.try_send(ack) {
                    tracing::warn!("Failed to acknowledge tool call {call_id}: {e}");
                }
                self.emit(TransportEvent::ToolCall {
                    name: client_tool_call.tool_name().to_string(),
                    call_id,
                })
                .await
            }
            ServerEvent::Close { reason } => {
                self.emit(TransportEvent::Disconnected { reason }).await;
                false
            }
            ServerEvent::Error { message } => {
                self.emit(TransportEvent::Error(message)).await;
                false
            }
            ServerEvent::Ping { .. } | ServerEvent::VadScore { .. } | ServerEvent::Unknown => true,
        }
    }

    async fn set_mode(&mut self, mode: AgentMode) -> bool {
        if mode == self.mode {
            return true;
        }
        self.mode = mode;
        self.speaking.store(mode == AgentMode::Speaking, Ordering::Relaxed);
        self.emit(TransportEvent::ModeChanged(mode)).await
    }

    async fn emit(&mut self, event: TransportEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}

async fn next_playback(playback: &mut Option<mpsc::Receiver<Playback>>) -> Option<Playback> {
    match playback {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Resamples microphone audio to the service rate and streams it out. Audio
/// captured while the agent speaks is dropped so it does not hear itself.
async fn pump_microphone(mut mic: MicFeed, client_tx: ClientTx, speaking: Arc<AtomicBool>) {
    let mut resampler =
        match create_resampler(mic.sample_rate as f64, CONVAI_PCM16_SAMPLE_RATE, INPUT_CHUNK_SIZE) {
            Ok(resampler) => resampler,
            Err(e) => {
                tracing::error!("Failed to create input resampler: {e:#}");
                return;
            }
        };
    let mut buffer: VecDeque<f32> = VecDeque::with_capacity(INPUT_CHUNK_SIZE * 2);

    while let Some(frame) = mic.frames.recv().await {
        if speaking.load(Ordering::Relaxed) {
            buffer.clear();
            continue;
        }
        buffer.extend(frame);
        let mut resampled: Vec<f32> = Vec::new();
        while buffer.len() >= INPUT_CHUNK_SIZE {
            let chunk: Vec<f32> = buffer.drain(..INPUT_CHUNK_SIZE).collect();
            if let Ok(out) = resampler.process(&[chunk.as_slice()], None) {
                if let Some(channel) = out.first() {
                    resampled.extend_from_slice(channel);
                }
            }
        }
        if resampled.is_empty() {
            continue;
        }
        let chunk = ClientEvent::UserAudioChunk(UserAudioChunkEvent::new(encode(&resampled)));
        if client_tx.send(chunk).await.is_err() {
            break;
        }
    }
    tracing::debug!("microphone pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::audio_slot;
    use convai_realtime::Config;
    use tokio::sync::broadcast;

    fn server_event(json: &str) -> ServerEvent {
        serde_json::from_str(json).unwrap()
    }

    struct Harness {
        server_tx: broadcast::Sender<ServerEvent>,
        client_rx: mpsc::Receiver<ClientEvent>,
        events: mpsc::Receiver<TransportEvent>,
        speaking: Arc<AtomicBool>,
        playback_tx: mpsc::Sender<Playback>,
        pump: JoinHandle<()>,
    }

    fn harness() -> Harness {
        let (server_tx, server_rx) = broadcast::channel(32);
        let (client_tx, client_rx) = mpsc::channel(32);
        let (event_tx, events) = mpsc::channel(32);
        let (playback_tx, playback_rx) = mpsc::channel(4);
        let speaking = Arc::new(AtomicBool::new(false));
        let pump = EventPump {
            server_rx,
            client_tx,
            events: event_tx,
            speaker: None,
            playback: Some(playback_rx),
            speaking: speaking.clone(),
            mode: AgentMode::Listening,
        };
        Harness {
            server_tx,
            client_rx,
            events,
            speaking,
            playback_tx,
            pump: tokio::spawn(pump.run()),
        }
    }

    #[tokio::test]
    async fn translates_a_conversation() {
        let mut h = harness();
        for json in [
            r#"{"type":"conversation_initiation_metadata","conversation_initiation_metadata_event":{"conversation_id":"c1"}}"#,
            r#"{"type":"user_transcript","user_transcription_event":{"user_transcript":"hej"}}"#,
            r#"{"type":"agent_response","agent_response_event":{"agent_response":"hej hej"}}"#,
            r#"{"type":"audio","audio_event":{"audio_base_64":"AAAA","event_id":1}}"#,
            r#"{"type":"audio","audio_event":{"audio_base_64":"AAAA","event_id":2}}"#,
            r#"{"type":"vad_score","vad_score_event":{"vad_score":0.2}}"#,
            r#"{"type":"client_tool_call","client_tool_call":{"tool_name":"Avsluta","tool_call_id":"call_1","parameters":{}}}"#,
        ] {
            h.server_tx.send(server_event(json)).unwrap();
        }
        h.server_tx
            .send(ServerEvent::Close {
                reason: Some("bye".to_string()),
            })
            .unwrap();

        let mut received = Vec::new();
        while let Some(event) = h.events.recv().await {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                TransportEvent::Connected,
                TransportEvent::ModeChanged(AgentMode::Thinking),
                TransportEvent::ModeChanged(AgentMode::Speaking),
                TransportEvent::ToolCall {
                    name: "Avsluta".to_string(),
                    call_id: "call_1".to_string(),
                },
                TransportEvent::Disconnected {
                    reason: Some("bye".to_string()),
                },
            ]
        );
        assert!(h.speaking.load(Ordering::Relaxed));

        let ack = serde_json::to_value(h.client_rx.recv().await.unwrap()).unwrap();
        assert_eq!(ack["type"], "client_tool_result");
        assert_eq!(ack["tool_call_id"], "call_1");
        h.pump.await.unwrap();
    }

    #[tokio::test]
    async fn drained_speaker_and_interruptions_return_to_listening() {
        let mut h = harness();
        h.server_tx
            .send(server_event(r#"{"type":"audio","audio_event":{"audio_base_64":"AAAA"}}"#))
            .unwrap();
        assert_eq!(
            h.events.recv().await,
            Some(TransportEvent::ModeChanged(AgentMode::Speaking))
        );

        h.playback_tx.send(Playback::Drained).await.unwrap();
        assert_eq!(
            h.events.recv().await,
            Some(TransportEvent::ModeChanged(AgentMode::Listening))
        );
        assert!(!h.speaking.load(Ordering::Relaxed));

        h.server_tx
            .send(server_event(r#"{"type":"audio","audio_event":{"audio_base_64":"AAAA"}}"#))
            .unwrap();
        h.server_tx
            .send(server_event(r#"{"type":"interruption","interruption_event":{"event_id":3}}"#))
            .unwrap();
        assert_eq!(
            h.events.recv().await,
            Some(TransportEvent::ModeChanged(AgentMode::Speaking))
        );
        assert_eq!(
            h.events.recv().await,
            Some(TransportEvent::ModeChanged(AgentMode::Listening))
        );
        h.pump.abort();
    }

    #[tokio::test]
    async fn socket_errors_end_the_pump() {
        let mut h = harness();
        h.server_tx
            .send(ServerEvent::Error {
                message: "connection reset".to_string(),
            })
            .unwrap();
        assert_eq!(
            h.events.recv().await,
            Some(TransportEvent::Error("connection reset".to_string()))
        );
        assert_eq!(h.events.recv().await, None);
        h.pump.await.unwrap();
    }

    #[tokio::test]
    async fn missing_api_key_is_reported_as_not_configured() {
        let services = ConvaiServices::new(RestClient::new(Config::new()));
        let err = services.session_credential("agent_1").await.unwrap_err();
        assert_eq!(err, CredentialError::NotConfigured);
    }

    #[tokio::test]
    async fn transport_is_inert_outside_a_conversation() {
        let mut transport = ConvaiTransport::new(audio_slot());
        assert!(transport.send_user_message("hello").is_err());
        assert!(transport.send_contextual_update("20 seconds").is_err());
        transport.end_session().await.unwrap();
        transport.end_session().await.unwrap();
    }
}
