//! Session manager control loop.

use crate::{CredentialsStore, SessionError, SessionResult};
use courier_transport::{
    canonical_address, CloseReason, PresenceState, Transport, TransportEvent, TransportHandle,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

const CONTROL_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Reconnect policy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay before the first reconnect attempt; doubles per failure.
    pub reconnect_base_delay: Duration,
    /// Upper bound on the reconnect delay.
    pub reconnect_max_delay: Duration,
    /// Consecutive failures tolerated before giving up until a manual
    /// `connect()`.
    pub max_reconnect_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_base_delay: Duration::from_secs(2),
            reconnect_max_delay: Duration::from_secs(60),
            max_reconnect_attempts: 10,
        }
    }
}

impl SessionConfig {
    pub fn from_config(config: &courier_core::Config) -> Self {
        Self {
            reconnect_base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            reconnect_max_delay: Duration::from_millis(config.reconnect_max_delay_ms),
            max_reconnect_attempts: config.max_reconnect_attempts,
        }
    }
}

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Lifecycle notifications for observers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connected,
    Disconnected(CloseReason),
    /// A pairing code for linking a fresh session.
    PairingCode(String),
    /// Automatic reconnects gave up; a manual `connect()` is required.
    ReconnectsExhausted,
}

enum ControlMsg {
    Connect,
    Logout,
    Stop { preserve_session: bool },
    Event(TransportEvent),
}

struct Shared {
    status: RwLock<SessionStatus>,
    handle: RwLock<Option<Arc<dyn TransportHandle>>>,
}

/// Owns the transport connection lifecycle.
///
/// All state transitions happen inside one control loop task; callers and
/// the transport event forwarder both talk to it through a channel, so a
/// reconnect decision can never interleave with another.
#[derive(Clone)]
pub struct SessionManager {
    control_tx: mpsc::Sender<ControlMsg>,
    shared: Arc<Shared>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Spawn the control loop. The manager starts `Disconnected`; call
    /// [`connect`](Self::connect) to bring the session up.
    pub fn start(
        transport: Arc<dyn Transport>,
        store: CredentialsStore,
        config: SessionConfig,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            status: RwLock::new(SessionStatus::Disconnected),
            handle: RwLock::new(None),
        });

        let control_loop = ControlLoop {
            transport,
            store,
            config,
            shared: shared.clone(),
            control_tx: control_tx.clone(),
            events_tx: events_tx.clone(),
            reconnect_attempts: 0,
            auto_reconnect: true,
        };
        tokio::spawn(control_loop.run(control_rx));

        Self {
            control_tx,
            shared,
            events_tx,
        }
    }

    /// Request a connection attempt. Also re-arms automatic reconnects
    /// after they were exhausted.
    pub async fn connect(&self) -> SessionResult<()> {
        self.send_control(ControlMsg::Connect).await
    }

    /// Invalidate the session server-side and discard credentials.
    pub async fn logout(&self) -> SessionResult<()> {
        self.send_control(ControlMsg::Logout).await
    }

    /// Shut the manager down. With `preserve_session` the connection is
    /// closed locally and credentials survive for the next start; without
    /// it the session is invalidated like a logout.
    pub async fn stop(&self, preserve_session: bool) -> SessionResult<()> {
        self.send_control(ControlMsg::Stop { preserve_session }).await
    }

    pub async fn status(&self) -> SessionStatus {
        *self.shared.status.read().await
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Send one text message. Requires an open session; performs exactly
    /// one transport call, retries belong to the queue.
    pub async fn send(&self, recipient: &str, body: &str) -> SessionResult<()> {
        if *self.shared.status.read().await != SessionStatus::Open {
            return Err(SessionError::NotConnected);
        }
        let handle = self
            .shared
            .handle
            .read()
            .await
            .clone()
            .ok_or(SessionError::NotConnected)?;

        let address = canonical_address(recipient);
        handle.send_text(&address, body).await?;
        Ok(())
    }

    /// Best-effort presence update. Failures are logged and swallowed so
    /// presence can never fail a dispatch.
    pub async fn presence(&self, recipient: &str, state: PresenceState) {
        let handle = self.shared.handle.read().await.clone();
        let Some(handle) = handle else {
            debug!(state = state.as_str(), "Presence skipped, no connection");
            return;
        };

        let address = canonical_address(recipient);
        if let Err(err) = handle.send_presence(&address, state).await {
            debug!(error = %err, state = state.as_str(), "Presence update failed, ignoring");
        }
    }

    async fn send_control(&self, msg: ControlMsg) -> SessionResult<()> {
        self.control_tx
            .send(msg)
            .await
            .map_err(|_| SessionError::ControlLoopStopped)
    }
}

struct ControlLoop {
    transport: Arc<dyn Transport>,
    store: CredentialsStore,
    config: SessionConfig,
    shared: Arc<Shared>,
    control_tx: mpsc::Sender<ControlMsg>,
    events_tx: broadcast::Sender<SessionEvent>,
    reconnect_attempts: u32,
    auto_reconnect: bool,
}

impl ControlLoop {
    async fn run(mut self, mut control_rx: mpsc::Receiver<ControlMsg>) {
        while let Some(msg) = control_rx.recv().await {
            match msg {
                ControlMsg::Connect => self.handle_connect().await,
                ControlMsg::Logout => self.handle_logout().await,
                ControlMsg::Stop { preserve_session } => {
                    self.handle_stop(preserve_session).await;
                    break;
                }
                ControlMsg::Event(event) => self.handle_event(event).await,
            }
        }
        debug!("Session control loop stopped");
    }

    async fn handle_connect(&mut self) {
        let status = *self.shared.status.read().await;
        if matches!(status, SessionStatus::Connecting | SessionStatus::Open) {
            debug!(?status, "Connect request ignored");
            return;
        }

        self.auto_reconnect = true;
        self.set_status(SessionStatus::Connecting).await;

        let credentials = self.store.load();
        if credentials.is_none() {
            info!("No stored session, starting pairing flow");
        }

        match self.transport.connect(credentials).await {
            Ok((handle, mut events)) => {
                *self.shared.handle.write().await = Some(Arc::from(handle));

                // Forward connection events into the control channel; the
                // stream ends when the connection closes.
                let control_tx = self.control_tx.clone();
                tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if control_tx.send(ControlMsg::Event(event)).await.is_err() {
                            break;
                        }
                    }
                });
            }
            Err(err) => {
                warn!(error = %err, "Connection attempt failed");
                self.set_status(SessionStatus::Disconnected).await;
                self.schedule_reconnect();
            }
        }
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionOpen => {
                self.reconnect_attempts = 0;
                self.set_status(SessionStatus::Open).await;
                info!("Session open");
                let _ = self.events_tx.send(SessionEvent::Connected);
            }
            TransportEvent::CredentialsUpdated(credentials) => {
                if let Err(err) = self.store.save(&credentials) {
                    error!(error = %err, "Failed to persist credentials");
                }
            }
            TransportEvent::PairingCodeAvailable(code) => {
                info!(code = %code, "Pairing code available");
                let _ = self.events_tx.send(SessionEvent::PairingCode(code));
            }
            TransportEvent::ConnectionClosed { reason } => {
                self.handle_close(reason).await;
            }
        }
    }

    async fn handle_close(&mut self, reason: CloseReason) {
        self.shared.handle.write().await.take();

        let status = *self.shared.status.read().await;
        if status == SessionStatus::Closing {
            debug!(%reason, "Connection closed during shutdown");
            return;
        }

        self.set_status(SessionStatus::Disconnected).await;
        let _ = self
            .events_tx
            .send(SessionEvent::Disconnected(reason.clone()));

        if !self.auto_reconnect {
            debug!(%reason, "Connection closed, reconnect disabled");
            return;
        }

        if reason.is_recoverable() {
            warn!(%reason, "Connection closed, scheduling reconnect");
            self.schedule_reconnect();
        } else {
            // The server invalidated the session. The stored credentials
            // are dead; reconnecting with them would just be rejected
            // again, so discard them and go straight into pairing.
            warn!("Session logged out, discarding credentials and re-pairing");
            if let Err(err) = self.store.clear() {
                error!(error = %err, "Failed to clear credentials");
            }
            let control_tx = self.control_tx.clone();
            tokio::spawn(async move {
                let _ = control_tx.send(ControlMsg::Connect).await;
            });
        }
    }

    async fn handle_logout(&mut self) {
        self.auto_reconnect = false;
        self.set_status(SessionStatus::Closing).await;

        if let Some(handle) = self.shared.handle.write().await.take() {
            if let Err(err) = handle.logout().await {
                warn!(error = %err, "Transport logout failed");
            }
        }
        if let Err(err) = self.store.clear() {
            error!(error = %err, "Failed to clear credentials");
        }

        self.set_status(SessionStatus::Disconnected).await;
        let _ = self
            .events_tx
            .send(SessionEvent::Disconnected(CloseReason::LoggedOut));
        info!("Logged out");
    }

    async fn handle_stop(&mut self, preserve_session: bool) {
        self.auto_reconnect = false;
        self.set_status(SessionStatus::Closing).await;

        if let Some(handle) = self.shared.handle.write().await.take() {
            let result = if preserve_session {
                handle.end().await
            } else {
                handle.logout().await
            };
            if let Err(err) = result {
                warn!(error = %err, "Transport close failed during stop");
            }
        }
        if !preserve_session {
            if let Err(err) = self.store.clear() {
                error!(error = %err, "Failed to clear credentials");
            }
        }

        self.set_status(SessionStatus::Disconnected).await;
        info!(preserve_session, "Session manager stopped");
    }

    fn schedule_reconnect(&mut self) {
        self.reconnect_attempts += 1;
        if self.reconnect_attempts > self.config.max_reconnect_attempts {
            warn!(
                attempts = self.config.max_reconnect_attempts,
                "Reconnect attempts exhausted, staying disconnected"
            );
            let _ = self.events_tx.send(SessionEvent::ReconnectsExhausted);
            self.reconnect_attempts = 0;
            return;
        }

        let delay = reconnect_delay(&self.config, self.reconnect_attempts);
        info!(
            attempt = self.reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );

        let control_tx = self.control_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = control_tx.send(ControlMsg::Connect).await;
        });
    }

    async fn set_status(&self, status: SessionStatus) {
        *self.shared.status.write().await = status;
    }
}

/// Exponential reconnect delay for the n-th consecutive attempt, capped at
/// the configured maximum.
fn reconnect_delay(config: &SessionConfig, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(20);
    let delay = config.reconnect_base_delay.saturating_mul(1 << shift);
    delay.min(config.reconnect_max_delay)
}
