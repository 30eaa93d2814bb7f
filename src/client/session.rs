//! Client session: connect/reconnect lifecycle, room joins, and the
//! listener registry.
//!
//! The session runs as one task owning the socket and the retry counter.
//! `connect` is idempotent; every successful (re)connect re-issues the
//! blogs-room join and, when a user id is known, the user-room join. On
//! an unexpected drop the task retries with exponential backoff, giving
//! up after [`MAX_RECONNECT_ATTEMPTS`] and staying disconnected until
//! `connect` is called again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::transport::{Connector, Socket};
use crate::models::{ClientMessage, EventKind, ServerEvent, TypingAction, TypingStarted, TypingStopped};

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Delay before retry number `attempt` (1-based).
fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.pow(attempt)
}

/// Connection state surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

type Listener = Box<dyn Fn(&ServerEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    by_kind: HashMap<EventKind, Vec<Listener>>,
}

impl Listeners {
    fn dispatch(&self, event: &ServerEvent) {
        if let Some(callbacks) = self.by_kind.get(&event.kind()) {
            for callback in callbacks {
                callback(event);
            }
        }
    }
}

enum SessionCommand {
    Connect,
    Disconnect,
    SetUser(Option<String>),
    Send(ClientMessage),
}

/// Handle to one client session. Cheap to clone; all clones share the
/// same connection, listeners, and status.
#[derive(Clone)]
pub struct SocketClient {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    listeners: Arc<Mutex<Listeners>>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl SocketClient {
    /// Create a session in the disconnected state. Must be called within
    /// a runtime; the session task lives until the last handle is dropped.
    pub fn new(connector: impl Connector) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let listeners = Arc::new(Mutex::new(Listeners::default()));
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let task = SessionTask {
            connector: Arc::new(connector),
            listeners: listeners.clone(),
            status: status_tx,
            cmd_rx,
            user_id: None,
        };
        tokio::spawn(task.run());

        Self {
            cmd_tx,
            listeners,
            status_rx,
        }
    }

    /// Open the connection. A no-op when already connected; restarts the
    /// retry cycle when disconnected.
    pub fn connect(&self) {
        self.send_cmd(SessionCommand::Connect);
    }

    /// Tear the connection down. No automatic reconnection happens until
    /// [`SocketClient::connect`] is called again.
    pub fn disconnect(&self) {
        self.send_cmd(SessionCommand::Disconnect);
    }

    /// Remember the logged-in user. Joins their room immediately when
    /// connected, and on every later reconnect.
    pub fn set_user(&self, user_id: impl Into<String>) {
        self.send_cmd(SessionCommand::SetUser(Some(user_id.into())));
    }

    /// Forget the user on logout; their room is no longer rejoined.
    pub fn clear_user(&self) {
        self.send_cmd(SessionCommand::SetUser(None));
    }

    /// Announce typing. Dropped silently unless connected.
    pub fn emit_typing(&self, user_id: &str, user_name: &str, action: TypingAction) {
        self.send_cmd(SessionCommand::Send(ClientMessage::UserTyping(
            TypingStarted {
                user_id: user_id.to_string(),
                user_name: user_name.to_string(),
                action,
            },
        )));
    }

    /// Announce the end of typing. Dropped silently unless connected.
    pub fn emit_stopped_typing(&self, user_id: &str) {
        self.send_cmd(SessionCommand::Send(ClientMessage::UserStoppedTyping(
            TypingStopped {
                user_id: user_id.to_string(),
            },
        )));
    }

    /// Register a listener for one event kind. Listeners are additive;
    /// registering twice means being called twice.
    pub fn on<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        guard.by_kind.entry(kind).or_default().push(Box::new(callback));
    }

    /// Drop every registered listener. Takes effect before any event not
    /// yet dispatched.
    pub fn remove_all_listeners(&self) {
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        guard.by_kind.clear();
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch for status transitions (connected indicator, tests).
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    fn send_cmd(&self, cmd: SessionCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("session task is gone; dropping command");
        }
    }
}

enum Phase {
    Idle,
    Pending { attempt: u32, delay: Option<Duration> },
    Active { socket: Socket },
}

struct SessionTask {
    connector: Arc<dyn Connector>,
    listeners: Arc<Mutex<Listeners>>,
    status: watch::Sender<ConnectionStatus>,
    cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    user_id: Option<String>,
}

impl SessionTask {
    async fn run(mut self) {
        let mut phase = Phase::Idle;
        loop {
            let next = match phase {
                Phase::Idle => self.idle().await,
                Phase::Pending { attempt, delay } => self.pending(attempt, delay).await,
                Phase::Active { socket } => self.active(socket).await,
            };
            match next {
                Some(p) => phase = p,
                None => break,
            }
        }
        debug!("session task stopped");
    }

    /// Disconnected, not retrying. Only `connect` leaves this state.
    async fn idle(&mut self) -> Option<Phase> {
        loop {
            match self.cmd_rx.recv().await? {
                SessionCommand::Connect => {
                    return Some(Phase::Pending {
                        attempt: 0,
                        delay: None,
                    })
                }
                SessionCommand::Disconnect => {}
                SessionCommand::SetUser(user) => self.user_id = user,
                SessionCommand::Send(_) => {}
            }
        }
    }

    /// One connection attempt, optionally after a backoff sleep. `attempt`
    /// counts failures so far.
    async fn pending(&mut self, attempt: u32, delay: Option<Duration>) -> Option<Phase> {
        self.status.send_replace(ConnectionStatus::Connecting);

        if let Some(delay) = delay {
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    () = &mut sleep => break,
                    cmd = self.cmd_rx.recv() => match cmd? {
                        SessionCommand::Connect => break,
                        SessionCommand::Disconnect => {
                            self.status.send_replace(ConnectionStatus::Disconnected);
                            return Some(Phase::Idle);
                        }
                        SessionCommand::SetUser(user) => self.user_id = user,
                        SessionCommand::Send(_) => {}
                    },
                }
            }
        }

        match self.connector.connect().await {
            Ok(socket) => {
                info!("socket connected");
                // Rooms must be rejoined from scratch on every connection.
                let _ = socket.tx.send(ClientMessage::JoinBlogsRoom);
                if let Some(user) = &self.user_id {
                    let _ = socket.tx.send(ClientMessage::JoinUserRoom(user.clone()));
                }
                self.status.send_replace(ConnectionStatus::Connected);
                Some(Phase::Active { socket })
            }
            Err(e) => {
                let attempt = attempt + 1;
                if attempt > MAX_RECONNECT_ATTEMPTS {
                    warn!(error = %e, "giving up after {MAX_RECONNECT_ATTEMPTS} failed reconnect attempts");
                    self.status.send_replace(ConnectionStatus::Disconnected);
                    Some(Phase::Idle)
                } else {
                    debug!(error = %e, attempt, "connect failed, backing off");
                    Some(Phase::Pending {
                        attempt,
                        delay: Some(backoff_delay(attempt)),
                    })
                }
            }
        }
    }

    async fn active(&mut self, mut socket: Socket) -> Option<Phase> {
        loop {
            tokio::select! {
                event = socket.rx.recv() => match event {
                    Some(event) => self.dispatch(&event),
                    None => {
                        warn!("socket dropped, reconnecting");
                        self.status.send_replace(ConnectionStatus::Connecting);
                        return Some(Phase::Pending {
                            attempt: 1,
                            delay: Some(backoff_delay(1)),
                        });
                    }
                },
                cmd = self.cmd_rx.recv() => match cmd? {
                    SessionCommand::Connect => {}
                    SessionCommand::Disconnect => {
                        info!("socket disconnected");
                        self.status.send_replace(ConnectionStatus::Disconnected);
                        return Some(Phase::Idle);
                    }
                    SessionCommand::SetUser(user) => {
                        if let Some(id) = &user {
                            let _ = socket.tx.send(ClientMessage::JoinUserRoom(id.clone()));
                        }
                        self.user_id = user;
                    }
                    SessionCommand::Send(msg) => {
                        if socket.tx.send(msg).is_err() {
                            warn!("socket dropped, reconnecting");
                            self.status.send_replace(ConnectionStatus::Connecting);
                            return Some(Phase::Pending {
                                attempt: 1,
                                delay: Some(backoff_delay(1)),
                            });
                        }
                    }
                },
            }
        }
    }

    fn dispatch(&self, event: &ServerEvent) {
        let guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        guard.dispatch(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testsupport::ChannelConnector;
    use crate::models::{TypingAction, UserRegisteredPayload};
    use std::sync::atomic::Ordering;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(5), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn connect_joins_rooms_in_order() {
        let (connector, mut ends, _) = ChannelConnector::new(0);
        let client = SocketClient::new(connector);
        client.set_user("u1");
        client.connect();

        let mut server = ends.recv().await.unwrap();
        assert_eq!(
            server.from_client.recv().await,
            Some(ClientMessage::JoinBlogsRoom)
        );
        assert_eq!(
            server.from_client.recv().await,
            Some(ClientMessage::JoinUserRoom("u1".to_string()))
        );

        let mut status = client.watch_status();
        status
            .wait_for(|s| *s == ConnectionStatus::Connected)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_and_rejoins_after_unexpected_drop() {
        let (connector, mut ends, attempts) = ChannelConnector::new(0);
        let client = SocketClient::new(connector);
        client.set_user("u1");
        client.connect();

        let mut first = ends.recv().await.unwrap();
        assert_eq!(
            first.from_client.recv().await,
            Some(ClientMessage::JoinBlogsRoom)
        );
        assert_eq!(
            first.from_client.recv().await,
            Some(ClientMessage::JoinUserRoom("u1".to_string()))
        );

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        client.on(EventKind::NewUserRegistered, move |event| {
            let _ = seen_tx.send(event.clone());
        });

        // Server drops the connection; the session backs off and retries.
        drop(first.to_client);

        let mut second = ends.recv().await.unwrap();
        assert_eq!(
            second.from_client.recv().await,
            Some(ClientMessage::JoinBlogsRoom)
        );
        assert_eq!(
            second.from_client.recv().await,
            Some(ClientMessage::JoinUserRoom("u1".to_string()))
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        // An event after the reconnect reaches the listener exactly once.
        second
            .to_client
            .send(ServerEvent::NewUserRegistered(UserRegisteredPayload {
                message: "welcome".to_string(),
                user_count: 3,
            }))
            .unwrap();
        assert!(seen_rx.recv().await.is_some());
        assert!(seen_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let (connector, _ends, attempts) = ChannelConnector::new(usize::MAX);
        let client = SocketClient::new(connector);
        client.connect();

        let mut status = client.watch_status();
        status
            .wait_for(|s| *s == ConnectionStatus::Connecting)
            .await
            .unwrap();
        status
            .wait_for(|s| *s == ConnectionStatus::Disconnected)
            .await
            .unwrap();

        // The initial attempt plus five retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_the_retry_cycle() {
        let (connector, _ends, attempts) = ChannelConnector::new(usize::MAX);
        let client = SocketClient::new(connector);
        client.connect();

        let mut status = client.watch_status();
        status
            .wait_for(|s| *s == ConnectionStatus::Connecting)
            .await
            .unwrap();
        client.disconnect();
        status
            .wait_for(|s| *s == ConnectionStatus::Disconnected)
            .await
            .unwrap();

        let tried = attempts.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), tried);
    }

    #[tokio::test]
    async fn emits_are_dropped_until_connected() {
        let (connector, mut ends, _) = ChannelConnector::new(0);
        let client = SocketClient::new(connector);

        client.emit_typing("u1", "alice", TypingAction::Creating);
        client.connect();

        let mut server = ends.recv().await.unwrap();
        // The pre-connect emit never made it; the join is first on the wire.
        assert_eq!(
            server.from_client.recv().await,
            Some(ClientMessage::JoinBlogsRoom)
        );

        client.emit_typing("u1", "alice", TypingAction::Creating);
        assert_eq!(
            server.from_client.recv().await,
            Some(ClientMessage::UserTyping(TypingStarted {
                user_id: "u1".to_string(),
                user_name: "alice".to_string(),
                action: TypingAction::Creating,
            }))
        );
    }

    #[tokio::test]
    async fn remove_all_listeners_stops_delivery() {
        let (connector, mut ends, _) = ChannelConnector::new(0);
        let client = SocketClient::new(connector);
        client.connect();
        let mut server = ends.recv().await.unwrap();
        assert_eq!(
            server.from_client.recv().await,
            Some(ClientMessage::JoinBlogsRoom)
        );

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        client.on(EventKind::NewUserRegistered, move |_| {
            let _ = seen_tx.send(());
        });

        let event = ServerEvent::NewUserRegistered(UserRegisteredPayload {
            message: "welcome".to_string(),
            user_count: 1,
        });
        server.to_client.send(event.clone()).unwrap();
        assert!(seen_rx.recv().await.is_some());

        client.remove_all_listeners();
        server.to_client.send(event).unwrap();

        // Fence: a later event through a fresh listener proves the previous
        // one was already dispatched (to nobody).
        let (fence_tx, mut fence_rx) = mpsc::unbounded_channel();
        client.on(EventKind::UserLoggedIn, move |_| {
            let _ = fence_tx.send(());
        });
        server
            .to_client
            .send(ServerEvent::UserLoggedIn(crate::models::UserLoggedInPayload {
                message: "hi".to_string(),
                timestamp: chrono::Utc::now(),
            }))
            .unwrap();
        assert!(fence_rx.recv().await.is_some());
        assert!(seen_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn remount_cycles_do_not_duplicate_delivery() {
        let (connector, mut ends, _) = ChannelConnector::new(0);
        let client = SocketClient::new(connector);
        client.connect();
        let mut server = ends.recv().await.unwrap();
        assert_eq!(
            server.from_client.recv().await,
            Some(ClientMessage::JoinBlogsRoom)
        );

        // Mount, unmount, mount again: each mount clears old listeners
        // before registering its own.
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        for _ in 0..3 {
            client.remove_all_listeners();
            let tx = seen_tx.clone();
            client.on(EventKind::NewUserRegistered, move |_| {
                let _ = tx.send(());
            });
        }

        server
            .to_client
            .send(ServerEvent::NewUserRegistered(UserRegisteredPayload {
                message: "welcome".to_string(),
                user_count: 1,
            }))
            .unwrap();
        assert!(seen_rx.recv().await.is_some());
        assert!(seen_rx.try_recv().is_err());
    }
}
