//! Connection Manager
//!
//! The actor that owns the transport handle and drives the lifecycle state
//! machine. All transport callbacks, the reconnect timer, the auth deadline
//! and heartbeat signals are handled as discrete turns of one task, so no
//! two of them ever overlap and at most one live transport exists.
//!
//! Consumers hold a [`LiveClient`]: a cheap handle offering the hook
//! contract (`is_connected`, `last_message`, `send_message`, `reconnect`)
//! plus access to the router and the notification store.

use std::future::pending;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};

use crate::config::{HeartbeatConfig, LiveConfig};
use crate::notifications::NotificationStore;
use crate::protocol::{FrameKind, InboundFrame, OutboundFrame};
use crate::router::{MessageRouter, ToastEvent};
use crate::transport::{
    ws_endpoint, Connector, Transport, TransportError, TransportEvent, WsConnector,
};

use super::error::ConnectionError;
use super::heartbeat::{spawn_heartbeat, HeartbeatEvent, HeartbeatHandle};
use super::reconnect::ReconnectPolicy;
use super::state::ConnectionState;

/// Requests from the consumer handle to the manager task
#[derive(Debug)]
enum Command {
    Connect { token: String },
    Reconnect,
    Disconnect,
    Send { kind: String, data: Value },
}

/// Consumer-facing handle to the real-time connection
///
/// Dropping the client tears the manager task down, cancelling any pending
/// reconnect timer and the heartbeat with it.
pub struct LiveClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    last_message_rx: watch::Receiver<Option<InboundFrame>>,
    router: MessageRouter,
    store: Arc<NotificationStore>,
    toast_rx: StdMutex<Option<mpsc::UnboundedReceiver<ToastEvent>>>,
    task: JoinHandle<()>,
}

impl LiveClient {
    /// Create a client using the real WebSocket transport
    pub fn new(config: LiveConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Create a client with a custom connector (the test seam)
    pub fn with_connector(config: LiveConfig, connector: Arc<dyn Connector>) -> Self {
        let store = Arc::new(NotificationStore::new());

        let (toast_tx, toast_rx) = if config.show_toasts {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        let router = MessageRouter::new(Arc::clone(&store), toast_tx);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (last_message_tx, last_message_rx) = watch::channel(None);
        let (hb_tx, hb_rx) = mpsc::unbounded_channel();

        let manager = ManagerTask {
            ws_url: ws_endpoint(&config.api_url),
            heartbeat_cfg: config.heartbeat.clone(),
            connector,
            router: router.clone(),
            policy: ReconnectPolicy::new(&config.reconnect),
            state: ConnectionState::Idle,
            token: None,
            attempt: 0,
            transport: None,
            heartbeat: None,
            reconnect_timer: None,
            auth_timer: None,
            cmd_rx,
            hb_tx,
            hb_rx,
            state_tx,
            last_message_tx,
        };
        let task = tokio::spawn(manager.run());

        Self {
            cmd_tx,
            state_rx,
            last_message_rx,
            router,
            store,
            toast_rx: StdMutex::new(toast_rx),
            task,
        }
    }

    /// Open the connection with the given credential token
    ///
    /// Returns immediately; the outcome arrives through the state watch.
    /// A no-op (logged) while already connecting or connected.
    pub fn connect(&self, token: impl Into<String>) {
        self.send_command(Command::Connect {
            token: token.into(),
        });
    }

    /// Close the connection and stop all reconnection; terminal
    pub fn disconnect(&self) {
        self.send_command(Command::Disconnect);
    }

    /// Restart the attempt counter from zero and connect again
    ///
    /// Callable even after attempts were exhausted or a fatal auth failure
    /// closed the connection.
    pub fn reconnect(&self) {
        self.send_command(Command::Reconnect);
    }

    /// Send an application frame `{"type": kind, "data": data}`
    ///
    /// Silently dropped (logged) unless the connection is live.
    pub fn send_message(&self, kind: impl Into<String>, data: Value) {
        self.send_command(Command::Send {
            kind: kind.into(),
            data,
        });
    }

    /// Whether the connection is currently live and authenticated
    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Observe lifecycle state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// The most recent inbound frame, if any
    pub fn last_message(&self) -> Option<InboundFrame> {
        self.last_message_rx.borrow().clone()
    }

    /// Observe inbound frames as they arrive
    pub fn watch_messages(&self) -> watch::Receiver<Option<InboundFrame>> {
        self.last_message_rx.clone()
    }

    /// The router, for subscriber registration
    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// The notification store shared with UI consumers
    pub fn notifications(&self) -> Arc<NotificationStore> {
        Arc::clone(&self.store)
    }

    /// Take the toast event receiver; `None` if toasts are disabled or
    /// the receiver was already taken
    pub fn take_toasts(&self) -> Option<mpsc::UnboundedReceiver<ToastEvent>> {
        match self.toast_rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        }
    }

    fn send_command(&self, command: Command) {
        if self.cmd_tx.send(command).is_err() {
            tracing::warn!("Connection manager is gone, command dropped");
        }
    }
}

impl Drop for LiveClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One turn of the manager's event loop
enum Turn {
    Command(Option<Command>),
    Transport(TransportEvent),
    ReconnectDue,
    AuthDeadline,
    Heartbeat(HeartbeatEvent),
}

/// The actor behind [`LiveClient`]
struct ManagerTask {
    ws_url: String,
    heartbeat_cfg: HeartbeatConfig,
    connector: Arc<dyn Connector>,
    router: MessageRouter,
    policy: ReconnectPolicy,

    state: ConnectionState,
    token: Option<String>,
    /// Failed cycles since the last successful `Connected` transition
    attempt: u32,
    transport: Option<Box<dyn Transport>>,
    heartbeat: Option<HeartbeatHandle>,
    /// At most one pending reconnect timer exists at a time
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    auth_timer: Option<Pin<Box<Sleep>>>,

    cmd_rx: mpsc::UnboundedReceiver<Command>,
    hb_tx: mpsc::UnboundedSender<HeartbeatEvent>,
    hb_rx: mpsc::UnboundedReceiver<HeartbeatEvent>,
    state_tx: watch::Sender<ConnectionState>,
    last_message_tx: watch::Sender<Option<InboundFrame>>,
}

impl ManagerTask {
    async fn run(mut self) {
        loop {
            let turn = tokio::select! {
                cmd = self.cmd_rx.recv() => Turn::Command(cmd),
                ev = next_transport_event(&mut self.transport) => Turn::Transport(ev),
                () = armed(&mut self.reconnect_timer) => Turn::ReconnectDue,
                () = armed(&mut self.auth_timer) => Turn::AuthDeadline,
                Some(ev) = self.hb_rx.recv() => Turn::Heartbeat(ev),
            };

            match turn {
                Turn::Command(None) => {
                    // Handle dropped; release everything and stop
                    self.stop_heartbeat().await;
                    self.drop_transport().await;
                    return;
                }
                Turn::Command(Some(cmd)) => self.handle_command(cmd).await,
                Turn::Transport(ev) => self.handle_transport_event(ev).await,
                Turn::ReconnectDue => {
                    self.reconnect_timer = None;
                    self.open_connection().await;
                }
                Turn::AuthDeadline => {
                    self.auth_timer = None;
                    tracing::warn!("Authentication handshake timed out");
                    self.handle_failure(ConnectionError::AuthTimeout).await;
                }
                Turn::Heartbeat(ev) => self.handle_heartbeat(ev).await,
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { token } => {
                if !self.state.accepts_connect() {
                    tracing::warn!(state = %self.state, "connect() ignored, connection already active");
                    return;
                }
                if self.state == ConnectionState::Closed {
                    // Fresh credentials restart the cycle from scratch
                    self.attempt = 0;
                }
                self.reconnect_timer = None;
                self.token = Some(token);
                self.open_connection().await;
            }
            Command::Reconnect => {
                if !self.state.accepts_connect() {
                    tracing::debug!(state = %self.state, "reconnect() ignored, connection already active");
                    return;
                }
                self.attempt = 0;
                self.reconnect_timer = None;
                self.open_connection().await;
            }
            Command::Disconnect => {
                tracing::info!("Disconnect requested");
                self.reconnect_timer = None;
                self.auth_timer = None;
                self.stop_heartbeat().await;
                self.drop_transport().await;
                self.set_state(ConnectionState::Closed);
            }
            Command::Send { kind, data } => self.send_app_frame(&kind, data).await,
        }
    }

    /// Open the transport and start the auth handshake
    async fn open_connection(&mut self) {
        let Some(token) = self.token.clone() else {
            tracing::warn!("No credentials available, staying idle");
            self.set_state(ConnectionState::Idle);
            return;
        };

        self.set_state(ConnectionState::Connecting);
        match self.connector.connect(&self.ws_url).await {
            Ok(mut transport) => {
                // The auth frame is the only thing allowed on the wire
                // until the server acknowledges it
                let auth = OutboundFrame::Auth { token };
                if let Err(e) = transport.send(auth.to_text()).await {
                    tracing::warn!(error = %e, "Failed to send auth frame");
                    self.handle_failure(ConnectionError::Transport(e)).await;
                    return;
                }
                self.transport = Some(transport);
                self.set_state(ConnectionState::Authenticating);
                self.auth_timer = Some(Box::pin(sleep(self.heartbeat_cfg.auth_timeout())));
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.ws_url, "Connection attempt failed");
                self.handle_failure(ConnectionError::Transport(e)).await;
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.handle_frame(&text).await,
            TransportEvent::Closed => {
                tracing::debug!("Transport closed by peer");
                self.handle_failure(ConnectionError::Transport(TransportError::Closed))
                    .await;
            }
            TransportEvent::Error(msg) => {
                tracing::warn!(error = %msg, "Transport error");
                self.handle_failure(ConnectionError::Transport(TransportError::Failed(msg)))
                    .await;
            }
        }
    }

    async fn handle_frame(&mut self, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed inbound frame");
                return;
            }
        };

        let _ = self.last_message_tx.send_replace(Some(frame.clone()));

        match frame.classify() {
            FrameKind::AuthAck => {
                if self.state == ConnectionState::Authenticating {
                    tracing::info!("Authenticated, connection live");
                    self.auth_timer = None;
                    self.attempt = 0;
                    self.set_state(ConnectionState::Connected);
                    self.start_heartbeat().await;
                } else {
                    tracing::debug!(state = %self.state, "Unexpected auth ack, ignoring");
                }
            }
            FrameKind::AuthError => {
                tracing::error!("Server rejected credentials");
                self.fail_fatal(&ConnectionError::AuthRejected).await;
            }
            _ => self.router.route(&frame).await,
        }
    }

    async fn handle_heartbeat(&mut self, event: HeartbeatEvent) {
        // Signals from a heartbeat that was already stopped are void
        if self.heartbeat.is_none() || self.state != ConnectionState::Connected {
            return;
        }
        match event {
            HeartbeatEvent::SendPing => {
                let Some(transport) = self.transport.as_mut() else {
                    return;
                };
                if let Err(e) = transport.send(OutboundFrame::Ping.to_text()).await {
                    tracing::warn!(error = %e, "Ping send failed");
                    self.handle_failure(ConnectionError::Transport(e)).await;
                }
            }
            HeartbeatEvent::Stale => {
                tracing::warn!("Connection stale, forcing reconnect");
                self.handle_failure(ConnectionError::Stale).await;
            }
        }
    }

    /// Tear down the current transport and decide between retry and giving up
    async fn handle_failure(&mut self, error: ConnectionError) {
        if self.state == ConnectionState::Closed {
            return;
        }
        if !error.is_transient() {
            self.fail_fatal(&error).await;
            return;
        }

        self.stop_heartbeat().await;
        self.drop_transport().await;
        self.auth_timer = None;

        match self.policy.next_delay(self.attempt) {
            Some(delay) => {
                tracing::info!(
                    error = %error,
                    attempt = self.attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.attempt += 1;
                self.set_state(ConnectionState::Reconnecting);
                if self.reconnect_timer.is_none() {
                    self.reconnect_timer = Some(Box::pin(sleep(delay)));
                }
            }
            None => {
                tracing::error!(
                    error = %error,
                    max_attempts = self.policy.max_attempts(),
                    "Reconnect attempts exhausted"
                );
                self.set_state(ConnectionState::Closed);
            }
        }
    }

    /// Terminal failure: no reconnect timer is ever scheduled
    async fn fail_fatal(&mut self, error: &ConnectionError) {
        tracing::error!(error = %error, "Fatal connection failure");
        self.stop_heartbeat().await;
        self.drop_transport().await;
        self.reconnect_timer = None;
        self.auth_timer = None;
        self.set_state(ConnectionState::Closed);
    }

    async fn send_app_frame(&mut self, kind: &str, data: Value) {
        if self.state != ConnectionState::Connected {
            tracing::debug!(kind = %kind, state = %self.state, "Dropping send, not connected");
            return;
        }
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(e) = transport.send(OutboundFrame::custom(kind, data)).await {
            tracing::warn!(error = %e, kind = %kind, "Send failed");
            self.handle_failure(ConnectionError::Transport(e)).await;
        }
    }

    async fn start_heartbeat(&mut self) {
        // Drop anything a previous session's loop left queued
        while self.hb_rx.try_recv().is_ok() {}

        let handle = spawn_heartbeat(self.heartbeat_cfg.interval(), self.hb_tx.clone());
        self.router.set_heartbeat(handle.pong_sender()).await;
        self.heartbeat = Some(handle);
    }

    async fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.stop();
            self.router.clear_heartbeat().await;
        }
    }

    async fn drop_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        tracing::debug!(from = %self.state, to = %next, "Connection state change");
        self.state = next;
        let _ = self.state_tx.send_replace(next);
    }
}

/// Next event from the transport, or never if none is open
async fn next_transport_event(transport: &mut Option<Box<dyn Transport>>) -> TransportEvent {
    match transport {
        Some(t) => t.next_event().await.unwrap_or(TransportEvent::Closed),
        None => pending().await,
    }
}

/// Resolve when an armed timer fires, or never if unarmed
async fn armed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
