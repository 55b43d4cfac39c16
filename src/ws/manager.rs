//! Ownership of the single live channel of a session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::connection::run_connection;
use super::messages::SocketFrame;
use super::subscription::LiveFeed;
use crate::config::ChatClientConfig;
use crate::domain::{ChatEvent, EventBus, UserId};
use crate::error::ChatError;

/// Outbound frames buffered before `send_frame` starts waiting.
const OUTBOUND_QUEUE: usize = 64;

/// How long `disconnect` waits for the socket task to close gracefully.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Observable state of the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport is being established.
    Connecting,
    /// Registered and receiving events.
    Connected,
    /// No live channel.
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct ActiveChannel {
    user_id: UserId,
    outbound: mpsc::Sender<SocketFrame>,
    task: JoinHandle<()>,
}

/// Resets the state to `Disconnected` unless the attempt completed, so an
/// abandoned `connect` future never leaves `Connecting` behind.
struct ConnectAttempt<'a> {
    state: &'a watch::Sender<ConnectionState>,
    completed: bool,
}

impl<'a> ConnectAttempt<'a> {
    fn start(state: &'a watch::Sender<ConnectionState>) -> Self {
        state.send_replace(ConnectionState::Connecting);
        Self {
            state,
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
        self.state.send_replace(ConnectionState::Connected);
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }
}

/// Owns at most one live channel and the bus it publishes on.
///
/// Created once per session and passed by reference to whoever needs live
/// delivery. The transport is never re-established automatically: after a
/// drop, [`ConnectionManager::connect`] has to be called again.
#[derive(Debug)]
pub struct ConnectionManager {
    socket_url: String,
    connect_timeout: Duration,
    bus: EventBus,
    state: Arc<watch::Sender<ConnectionState>>,
    channel: Option<ActiveChannel>,
}

impl ConnectionManager {
    /// Creates a disconnected manager.
    #[must_use]
    pub fn new(socket_url: impl Into<String>, connect_timeout: Duration, bus: EventBus) -> Self {
        Self {
            socket_url: socket_url.into(),
            connect_timeout,
            bus,
            state: Arc::new(watch::channel(ConnectionState::Disconnected).0),
            channel: None,
        }
    }

    /// Creates a disconnected manager from the client configuration.
    #[must_use]
    pub fn from_config(config: &ChatClientConfig) -> Self {
        Self::new(
            config.socket_url.clone(),
            config.connect_timeout,
            EventBus::new(config.event_bus_capacity),
        )
    }

    /// Opens the live channel and registers `user_id` on it.
    ///
    /// No-op while a live channel exists. A channel whose transport dropped
    /// is discarded and replaced. The state is `Connecting` until the socket
    /// is open and the registration is queued.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Transport`] if the socket cannot be opened within
    /// the connect timeout.
    pub async fn connect(&mut self, user_id: &UserId) -> Result<(), ChatError> {
        if let Some(channel) = &self.channel {
            if self.is_alive(channel) {
                if &channel.user_id != user_id {
                    tracing::warn!(
                        connected_as = %channel.user_id,
                        requested = %user_id,
                        "live channel already registered for another user"
                    );
                }
                return Ok(());
            }
            tracing::debug!(user_id = %channel.user_id, "discarding dropped live channel");
        }
        self.channel = None;

        tracing::info!(url = %self.socket_url, %user_id, "opening live channel");
        let attempt = ConnectAttempt::start(&self.state);
        let connect = tokio_tungstenite::connect_async(self.socket_url.as_str());
        let (socket, _response) = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "live channel connect failed");
                return Err(ChatError::Transport(err.to_string()));
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.connect_timeout, "live channel connect timed out");
                return Err(ChatError::Transport(format!(
                    "connect timed out after {:?}",
                    self.connect_timeout
                )));
            }
        };

        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);

        // Queued before the loop starts, so it is the first frame on the wire.
        outbound
            .send(SocketFrame::Register(user_id.clone()))
            .await
            .map_err(|_| ChatError::Transport("outbound queue closed".to_string()))?;
        attempt.complete();

        let task = tokio::spawn(run_connection(
            socket,
            outbound_rx,
            Arc::clone(&self.state),
            self.bus.clone(),
        ));

        self.channel = Some(ActiveChannel {
            user_id: user_id.clone(),
            outbound,
            task,
        });
        self.bus.publish(ChatEvent::Connected {
            user_id: user_id.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!(%user_id, "live channel registered");
        Ok(())
    }

    /// Closes the live channel. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        let ActiveChannel {
            user_id,
            outbound,
            mut task,
            ..
        } = channel;
        // Dropping the last sender tells the loop to send a close frame.
        drop(outbound);
        if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
            tracing::warn!(%user_id, "live channel did not close in time; aborting");
            task.abort();
        }
        self.state.send_replace(ConnectionState::Disconnected);
        tracing::debug!(%user_id, "live channel torn down");
    }

    /// Queues a frame on the live channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotConnected`] when no live channel exists or it
    /// closed before the frame could be queued.
    pub async fn send_frame(&self, frame: SocketFrame) -> Result<(), ChatError> {
        let channel = self
            .channel
            .as_ref()
            .filter(|c| self.is_alive(c))
            .ok_or(ChatError::NotConnected)?;
        channel
            .outbound
            .send(frame)
            .await
            .map_err(|_| ChatError::NotConnected)
    }

    /// Subscribes to every future live event (multicast).
    #[must_use]
    pub fn on_message(&self) -> LiveFeed {
        LiveFeed::new(self.bus.subscribe())
    }

    /// The bus live events are published on.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match &self.channel {
            Some(channel) if channel.task.is_finished() => ConnectionState::Disconnected,
            _ => *self.state.borrow(),
        }
    }

    /// Watches state transitions, including `Connecting` while a
    /// [`ConnectionManager::connect`] call is in progress.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Returns `true` while a registered live channel exists.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// User the live channel is registered for, if connected.
    #[must_use]
    pub fn registered_user(&self) -> Option<&UserId> {
        self.channel
            .as_ref()
            .filter(|c| self.is_alive(c))
            .map(|c| &c.user_id)
    }

    fn is_alive(&self, channel: &ActiveChannel) -> bool {
        *self.state.borrow() != ConnectionState::Disconnected && !channel.task.is_finished()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.task.abort();
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(
            "ws://127.0.0.1:9/socket",
            Duration::from_secs(2),
            EventBus::new(16),
        )
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let mgr = manager();
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert!(!mgr.is_connected());
        assert!(mgr.registered_user().is_none());
    }

    #[tokio::test]
    async fn send_without_channel_fails_explicitly() {
        let mgr = manager();
        let result = mgr.send_frame(SocketFrame::Register(UserId::from("u1"))).await;
        assert!(matches!(result, Err(ChatError::NotConnected)));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut mgr = manager();
        mgr.disconnect().await;
        mgr.disconnect().await;
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn refused_connect_is_a_transport_error() {
        let mut mgr = manager();
        let result = mgr.connect(&UserId::from("u1")).await;
        let Err(err) = result else {
            panic!("nothing listens on port 9");
        };
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
        assert!(!mgr.is_connected());
    }

    #[tokio::test]
    async fn connecting_is_visible_until_the_attempt_ends() {
        // Accepts TCP but never answers the upgrade.
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        let mut mgr = ConnectionManager::new(
            format!("ws://{addr}/socket"),
            Duration::from_millis(300),
            EventBus::new(4),
        );
        let mut states = mgr.watch_state();
        assert_eq!(*states.borrow(), ConnectionState::Disconnected);

        let user = UserId::from("u1");
        let (result, saw_connecting) = tokio::join!(mgr.connect(&user), async {
            states
                .wait_for(|s| *s == ConnectionState::Connecting)
                .await
                .is_ok()
        });
        assert!(saw_connecting);
        assert!(matches!(result, Err(ChatError::Transport(_))));
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(*mgr.watch_state().borrow(), ConnectionState::Disconnected);
        drop(listener);
    }

    #[tokio::test]
    async fn feeds_are_multicast() {
        let mgr = manager();
        let mut a = mgr.on_message();
        let mut b = mgr.on_message();
        mgr.event_bus().publish(ChatEvent::Connected {
            user_id: UserId::from("u1"),
            timestamp: Utc::now(),
        });
        assert!(matches!(a.try_next(), Some(ChatEvent::Connected { .. })));
        assert!(matches!(b.try_next(), Some(ChatEvent::Connected { .. })));
    }
}
