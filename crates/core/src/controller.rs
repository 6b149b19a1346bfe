//! The live session controller.
//!
//! One controller drives one play session from `Idle` to `Ended`. Timer
//! ticks, motion samples, transport events and user actions are all funneled
//! through [`SessionController::run`], which turns each into a
//! [`SessionInput`] and handles it synchronously. Nothing else mutates the
//! session, so a tick can never interleave with another tick and nothing is
//! acted on once the loop has decided to end.

use crate::error::SessionError;
use crate::events::{MotionSample, TransportEvent, UserAction};
use crate::motion::{MotionAvailability, MotionReducer, FIRST_SAMPLE_TIMEOUT};
use crate::session_state::{EndReason, SessionOutcome, SessionPhase, SessionState};
use crate::setting::Setting;
use crate::timer::{SessionTimer, TICK_PERIOD, TimerNotice};
use crate::transport::{ConversationTransport, CredentialProvider, Platform, is_end_call_tool};
use std::future::pending;
use std::pin::Pin;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

#[derive(Debug)]
enum SessionInput {
    Transport(TransportEvent),
    /// The transport dropped its event channel without saying goodbye.
    TransportClosed,
    Tick,
    Motion(MotionSample),
    MotionClosed,
    FirstSampleOverdue,
    User(UserAction),
    HostClosed,
}

pub struct SessionController<T, C, P> {
    setting: Setting,
    transport: T,
    credentials: C,
    platform: P,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    timer: SessionTimer,
    ticker: Option<Interval>,
    reducer: MotionReducer,
    motion_permitted: bool,
    motion_rx: Option<mpsc::Receiver<MotionSample>>,
    first_sample: Option<Pin<Box<Sleep>>>,
    transport_open: bool,
}

impl<T, C, P> SessionController<T, C, P>
where
    T: ConversationTransport,
    C: CredentialProvider,
    P: Platform,
{
    /// Prepares a session for `setting`. The setting is a snapshot; later
    /// edits do not affect this session.
    pub fn new(setting: Setting, transport: T, credentials: C, platform: P) -> Self {
        let state = SessionState::new(setting.accelerometer_sensitivity);
        let (state_tx, _) = watch::channel(state.clone());
        Self {
            reducer: MotionReducer::new(setting.accelerometer_sensitivity),
            setting,
            transport,
            credentials,
            platform,
            state,
            state_tx,
            timer: SessionTimer::inactive(),
            ticker: None,
            motion_permitted: false,
            motion_rx: None,
            first_sample: None,
            transport_open: false,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn setting(&self) -> &Setting {
        &self.setting
    }

    /// Connects and runs the session until it ends.
    ///
    /// Closing `actions` counts as the host going away and ends the session.
    pub async fn run(mut self, mut actions: mpsc::Receiver<UserAction>) -> SessionOutcome {
        // Leaving must not wait on a stalled credential fetch or handshake.
        let connected = tokio::select! {
            biased;
            result = self.connect() => Ok(result),
            reason = cancelled(&mut actions) => Err(reason),
        };
        let mut events = match connected {
            Ok(Ok(events)) => events,
            Err(reason) => {
                tracing::info!(?reason, "session cancelled while connecting");
                self.teardown().await;
                return SessionOutcome::Ended(reason);
            }
            Ok(Err(err)) => {
                tracing::error!("Failed to start conversation: {err}");
                self.state.error = Some(err.to_string());
                self.teardown().await;
                return SessionOutcome::Aborted(err);
            }
        };

        let reason = loop {
            let input = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => SessionInput::Transport(event),
                    None => SessionInput::TransportClosed,
                },
                _ = next_tick(&mut self.ticker) => SessionInput::Tick,
                sample = next_sample(&mut self.motion_rx) => match sample {
                    Some(sample) => SessionInput::Motion(sample),
                    None => SessionInput::MotionClosed,
                },
                _ = sample_deadline(&mut self.first_sample) => SessionInput::FirstSampleOverdue,
                action = actions.recv() => match action {
                    Some(action) => SessionInput::User(action),
                    None => SessionInput::HostClosed,
                },
            };
            if let Some(reason) = self.dispatch(input) {
                break reason;
            }
        };

        tracing::info!(?reason, "session ending");
        self.teardown().await;
        SessionOutcome::Ended(reason)
    }

    async fn connect(&mut self) -> Result<mpsc::Receiver<TransportEvent>, SessionError> {
        self.state.advance(SessionPhase::Connecting);
        self.publish();
        tracing::info!(setting = %self.setting.name, agent_id = %self.setting.agent_id, "connecting");

        self.platform.request_audio_capability().await?;

        self.motion_permitted = self.platform.request_motion_permission().await;
        if !self.motion_permitted {
            tracing::warn!("motion permission denied, shake detection unavailable");
            self.reducer.mark_unavailable();
            self.publish();
        }

        let credential = self
            .credentials
            .session_credential(&self.setting.agent_id)
            .await?;

        let events = self
            .transport
            .start_session(&credential)
            .await
            .map_err(|e| SessionError::Transport(format!("{e:#}")))?;
        self.transport_open = true;
        Ok(events)
    }

    /// Applies one input. Returns the reason to end, if this input ends the
    /// session.
    fn dispatch(&mut self, input: SessionInput) -> Option<EndReason> {
        match input {
            SessionInput::Transport(event) => self.on_transport_event(event),
            SessionInput::TransportClosed => {
                tracing::warn!("transport event channel closed");
                Some(EndReason::RemoteDisconnect(None))
            }
            SessionInput::Tick => self.on_tick(),
            SessionInput::Motion(sample) => {
                self.on_motion(sample);
                None
            }
            SessionInput::MotionClosed => {
                self.on_motion_closed();
                None
            }
            SessionInput::FirstSampleOverdue => {
                self.on_first_sample_overdue();
                None
            }
            SessionInput::User(action) => self.on_user_action(action),
            SessionInput::HostClosed => Some(EndReason::HostClosed),
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) -> Option<EndReason> {
        match event {
            TransportEvent::Connected => {
                if self.state.phase != SessionPhase::Connecting {
                    tracing::warn!(phase = ?self.state.phase, "ignoring duplicate connect");
                    return None;
                }
                self.on_connected();
                None
            }
            TransportEvent::Disconnected { reason } => {
                tracing::info!(?reason, "agent disconnected");
                Some(EndReason::RemoteDisconnect(reason))
            }
            TransportEvent::Error(message) => {
                tracing::error!("Conversation error: {message}");
                self.state.error = Some(message.clone());
                Some(EndReason::RemoteError(message))
            }
            TransportEvent::ModeChanged(mode) => {
                if self.state.phase == SessionPhase::Connected {
                    tracing::debug!(%mode, "agent mode changed");
                    self.state.agent_mode = mode;
                    self.publish();
                }
                None
            }
            TransportEvent::ToolCall { name, call_id } => {
                if is_end_call_tool(&name) {
                    tracing::info!(%name, %call_id, "agent ended the call");
                    Some(EndReason::EndCallTool(name))
                } else {
                    tracing::warn!(%name, %call_id, "ignoring unknown client tool");
                    None
                }
            }
        }
    }

    fn on_connected(&mut self) {
        self.state.advance(SessionPhase::Connected);

        if self.motion_permitted && self.reducer.activate() {
            self.motion_rx = Some(self.platform.motion_samples());
            if self.reducer.availability() == MotionAvailability::AwaitingSample {
                self.first_sample = Some(Box::pin(tokio::time::sleep(FIRST_SAMPLE_TIMEOUT)));
            }
        }

        self.timer = SessionTimer::start(self.setting.session_length);
        if self.timer.is_active() {
            let mut ticker = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.ticker = Some(ticker);
        }
        self.state.remaining_seconds = self.timer.remaining();
        tracing::info!(
            remaining = ?self.state.remaining_seconds,
            motion = self.reducer.is_active(),
            "connected to agent"
        );
        self.publish();
    }

    fn on_tick(&mut self) -> Option<EndReason> {
        if self.state.phase != SessionPhase::Connected {
            return None;
        }
        let notice = self.timer.tick()?;
        self.state.remaining_seconds = self.timer.remaining();
        self.publish();

        if notice == TimerNotice::HardStop {
            tracing::warn!("wrap-up grace period exceeded, forcing the session closed");
            return Some(EndReason::HardStop);
        }
        if let Some(message) = notice.message() {
            tracing::info!("Sending contextual update: {message}");
            if let Err(e) = self.transport.send_contextual_update(&message) {
                tracing::warn!("Failed to send contextual update: {e:#}");
            }
        }
        None
    }

    fn on_motion(&mut self, sample: MotionSample) {
        if self.state.phase != SessionPhase::Connected {
            return;
        }
        if let Some(shake) = self.reducer.observe(sample, Instant::now()) {
            tracing::info!(intensity = shake.intensity, "shake detected");
            self.send_bump();
        }
        self.publish();
    }

    fn on_first_sample_overdue(&mut self) {
        self.first_sample = None;
        if self.reducer.first_sample_overdue() {
            tracing::warn!("no motion samples observed, shake detection unavailable");
            self.motion_rx = None;
            self.publish();
        }
    }

    fn on_motion_closed(&mut self) {
        self.motion_rx = None;
        self.first_sample = None;
        if self.reducer.availability() != MotionAvailability::Unavailable {
            tracing::warn!("motion stream closed, shake detection unavailable");
            self.reducer.mark_unavailable();
            self.publish();
        }
    }

    fn on_user_action(&mut self, action: UserAction) -> Option<EndReason> {
        match action {
            UserAction::Bump => {
                if self.state.phase == SessionPhase::Connected {
                    self.send_bump();
                } else {
                    tracing::debug!(phase = ?self.state.phase, "bump ignored while not connected");
                }
                None
            }
            UserAction::Restart => Some(EndReason::UserRestart),
            UserAction::Leave => Some(EndReason::UserLeave),
        }
    }

    fn send_bump(&mut self) {
        if let Err(e) = self.transport.send_user_message(&self.setting.bump_instruction) {
            tracing::warn!("Failed to send bump: {e:#}");
        }
    }

    /// Stops everything this session started. Safe to call more than once.
    ///
    /// The timer and motion subscription are released before the first await
    /// so nothing can fire while the transport is closing.
    async fn teardown(&mut self) {
        self.timer.stop();
        self.ticker = None;
        self.reducer.deactivate();
        self.motion_rx = None;
        self.first_sample = None;
        self.state.remaining_seconds = None;
        self.state.advance(SessionPhase::Ended);
        self.publish();

        if self.transport_open {
            self.transport_open = false;
            if let Err(e) = self.transport.end_session().await {
                tracing::warn!("Failed to end session cleanly: {e:#}");
            }
        }
    }

    fn publish(&mut self) {
        self.state.motion = self.reducer.diagnostics();
        self.state_tx.send_replace(self.state.clone());
    }
}

/// Resolves once the host leaves, restarts or goes away. Bumps are dropped.
async fn cancelled(actions: &mut mpsc::Receiver<UserAction>) -> EndReason {
    loop {
        match actions.recv().await {
            Some(UserAction::Bump) => tracing::debug!("bump ignored while connecting"),
            Some(UserAction::Restart) => return EndReason::UserRestart,
            Some(UserAction::Leave) => return EndReason::UserLeave,
            None => return EndReason::HostClosed,
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

async fn next_sample(rx: &mut Option<mpsc::Receiver<MotionSample>>) -> Option<MotionSample> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn sample_deadline(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
