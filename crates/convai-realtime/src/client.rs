use crate::client::stats::Stats;
use crate::types;
use crate::types::events::client::{
    ClientMessage, ContextualUpdateEvent, PongEvent, UserMessageEvent,
};
use anyhow::{Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

pub(crate) mod config;
pub(crate) mod consts;
pub(crate) mod stats;
mod utils;

pub type ClientTx = tokio::sync::mpsc::Sender<types::ClientEvent>;
type ServerTx = tokio::sync::broadcast::Sender<types::ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<types::ServerEvent>;

/// A conversation socket.
///
/// Outbound events go through an mpsc channel drained by a writer task;
/// inbound events are parsed by a reader task and broadcast to subscribers.
pub struct Client {
    capacity: usize,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    // Subscribed before the reader starts so the initiation metadata is never missed.
    first_rx: Option<ServerRx>,
    reader: Option<JoinHandle<()>>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            c_tx: None,
            s_tx: None,
            first_rx: None,
            reader: None,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    async fn connect(&mut self, signed_url: &SecretString) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow!("already connected"));
        }

        let request = utils::build_request(signed_url)?;
        let (ws_stream, _) =
            tokio::time::timeout(consts::CONNECT_TIMEOUT, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| anyhow!("handshake timed out after {:?}", consts::CONNECT_TIMEOUT))??;
        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<types::ClientEvent>(self.capacity);
        let (s_tx, first_rx) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx.clone());
        self.s_tx = Some(s_tx.clone());
        self.first_rx = Some(first_rx);

        let stats = self.stats.clone();
        tokio::spawn(async move {
            while let Some(event) = c_rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send {}: {}", event.name(), e);
                            continue;
                        }
                        if let Ok(mut stats_guard) = stats.lock() {
                            stats_guard.record_sent();
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize event: {}", e);
                    }
                }
            }
            // Every sender is gone: the conversation is over.
            if let Err(e) = write.close().await {
                tracing::debug!("failed to close socket: {}", e);
            }
        });

        let stats = self.stats.clone();
        let reader = tokio::spawn(async move {
            let mut closed = false;
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        broadcast(
                            &s_tx,
                            types::ServerEvent::Error {
                                message: e.to_string(),
                            },
                        );
                        closed = true;
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<types::ServerEvent>(&text) {
                        Ok(event) => {
                            tracing::debug!("received message: {}", event.name());
                            if let Ok(mut stats_guard) = stats.lock() {
                                stats_guard.record_received(&event);
                            }
                            if let types::ServerEvent::Ping { ping_event } = &event {
                                let pong = ClientMessage::Pong(PongEvent::new(ping_event.event_id()));
                                match c_tx.try_send(pong.into()) {
                                    Ok(()) => {
                                        if let Ok(mut stats_guard) = stats.lock() {
                                            stats_guard.record_pong();
                                        }
                                    }
                                    Err(e) => tracing::warn!("failed to answer ping: {}", e),
                                }
                            }
                            broadcast(&s_tx, event);
                        }
                        Err(e) => {
                            tracing::error!("failed to deserialize event: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(frame) => {
                        tracing::info!("connection closed: {:?}", frame);
                        let reason = frame
                            .map(|frame| frame.reason.to_string())
                            .filter(|reason| !reason.is_empty());
                        broadcast(&s_tx, types::ServerEvent::Close { reason });
                        closed = true;
                        break;
                    }
                    _ => {}
                }
            }
            if !closed {
                broadcast(&s_tx, types::ServerEvent::Close { reason: None });
            }
            drop(c_tx);
        });
        self.reader = Some(reader);
        Ok(())
    }

    /// Receiver for server events. The first call gets every event since the
    /// socket opened; later calls only see events from then on.
    pub fn server_events(&mut self) -> Result<ServerRx> {
        if let Some(rx) = self.first_rx.take() {
            return Ok(rx);
        }
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow!("not connected yet")),
        }
    }

    /// A sender for tasks that stream events, such as microphone audio.
    pub fn sender(&self) -> Result<ClientTx> {
        self.c_tx.clone().ok_or_else(|| anyhow!("not connected yet"))
    }

    pub fn is_connected(&self) -> bool {
        self.c_tx.is_some()
    }

    pub fn stats(&self) -> Result<Stats> {
        if let Ok(stats_guard) = self.stats.lock() {
            Ok(stats_guard.clone())
        } else {
            Err(anyhow!("failed to get stats"))
        }
    }

    /// Enqueues an event without waiting.
    fn try_send_client_event(&self, event: types::ClientEvent) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.try_send(event)
                    .map_err(|e| anyhow!("failed to enqueue event: {e}"))?;
                Ok(())
            }
            None => Err(anyhow!("not connected yet")),
        }
    }

    pub fn send_user_message(&self, text: &str) -> Result<()> {
        self.try_send_client_event(ClientMessage::UserMessage(UserMessageEvent::new(text)).into())
    }

    pub fn send_contextual_update(&self, text: &str) -> Result<()> {
        self.try_send_client_event(
            ClientMessage::ContextualUpdate(ContextualUpdateEvent::new(text)).into(),
        )
    }

    /// Stops reading and releases this client's sender. The socket closes
    /// once every sender handed out by [`Client::sender`] is dropped too.
    pub fn disconnect(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.first_rx = None;
        self.s_tx = None;
        if self.c_tx.take().is_some() {
            tracing::info!("disconnected");
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn broadcast(s_tx: &ServerTx, event: types::ServerEvent) {
    if let Err(e) = s_tx.send(event) {
        tracing::warn!("no subscriber for {}", e.0.name());
    }
}

pub async fn connect_with_capacity(capacity: usize, signed_url: &SecretString) -> Result<Client> {
    let mut client = Client::new(capacity);
    client.connect(signed_url).await?;
    Ok(client)
}

/// Opens a conversation on a signed URL.
pub async fn connect(signed_url: &SecretString) -> Result<Client> {
    connect_with_capacity(consts::DEFAULT_CAPACITY, signed_url).await
}
