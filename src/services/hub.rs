//! The event hub: a single task that owns every connection's outbound
//! channel and the room membership tables, driven by a command queue.
//!
//! Handlers publish change events after their database write commits; the
//! hub fans each event out to the union of its target rooms, at most once
//! per connection. Rooms carry no history, so a connection only sees
//! events published after it joined.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{ChangeEvent, EventTarget, Room, ServerEvent, TypingStarted, TypingStopped};

/// Identifies one websocket connection for the lifetime of its socket.
/// A client that reconnects gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    pub connections: usize,
    pub rooms: usize,
}

enum HubCommand {
    Register {
        conn: ConnectionId,
        sender: mpsc::UnboundedSender<ServerEvent>,
    },
    Deregister {
        conn: ConnectionId,
    },
    Join {
        conn: ConnectionId,
        room: Room,
    },
    Publish {
        event: ChangeEvent,
    },
    RelayTyping {
        from: ConnectionId,
        payload: TypingStarted,
    },
    RelayStoppedTyping {
        from: ConnectionId,
        payload: TypingStopped,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
    Stop,
}

/// Cloneable handle to the hub task. All methods are fire-and-forget
/// sends onto the command queue; once the hub has stopped they become
/// no-ops rather than errors.
#[derive(Clone)]
pub struct EventHub {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl EventHub {
    /// Spawn the hub task and return a handle to it.
    pub fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self { tx }
    }

    pub fn register(&self, conn: ConnectionId, sender: mpsc::UnboundedSender<ServerEvent>) {
        self.send(HubCommand::Register { conn, sender });
    }

    pub fn deregister(&self, conn: ConnectionId) {
        self.send(HubCommand::Deregister { conn });
    }

    pub fn join(&self, conn: ConnectionId, room: Room) {
        self.send(HubCommand::Join { conn, room });
    }

    /// Hand a committed change over to the hub for delivery. Never fails:
    /// a stopped hub drops the event and the caller's request still
    /// succeeds.
    pub fn publish(&self, event: ChangeEvent) {
        self.send(HubCommand::Publish { event });
    }

    pub fn relay_typing(&self, from: ConnectionId, payload: TypingStarted) {
        self.send(HubCommand::RelayTyping { from, payload });
    }

    pub fn relay_stopped_typing(&self, from: ConnectionId, payload: TypingStopped) {
        self.send(HubCommand::RelayStoppedTyping { from, payload });
    }

    /// Snapshot of connection and room counts. Commands are processed in
    /// order, so awaiting this also confirms everything sent before it
    /// has been applied. Returns zeroes once the hub has stopped.
    pub async fn stats(&self) -> HubStats {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats { reply });
        rx.await.unwrap_or_default()
    }

    /// Stop the hub task. Events published afterwards are dropped.
    pub fn stop(&self) {
        self.send(HubCommand::Stop);
    }

    fn send(&self, cmd: HubCommand) {
        if self.tx.send(cmd).is_err() {
            debug!("event hub is stopped; dropping command");
        }
    }
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    rooms: HashMap<Room, HashSet<ConnectionId>>,
    joined: HashMap<ConnectionId, HashSet<Room>>,
}

async fn run(mut rx: mpsc::UnboundedReceiver<HubCommand>) {
    let mut state = HubState::default();
    while let Some(cmd) = rx.recv().await {
        match cmd {
            HubCommand::Register { conn, sender } => state.register(conn, sender),
            HubCommand::Deregister { conn } => state.deregister(conn),
            HubCommand::Join { conn, room } => state.join(conn, room),
            HubCommand::Publish { event } => state.publish(event),
            HubCommand::RelayTyping { from, payload } => {
                state.relay(from, ServerEvent::UserTyping(payload))
            }
            HubCommand::RelayStoppedTyping { from, payload } => {
                state.relay(from, ServerEvent::UserStoppedTyping(payload))
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(state.stats());
            }
            HubCommand::Stop => break,
        }
    }
    debug!("event hub stopped");
}

impl HubState {
    fn register(&mut self, conn: ConnectionId, sender: mpsc::UnboundedSender<ServerEvent>) {
        debug!(%conn, "connection registered");
        self.connections.insert(conn, sender);
    }

    fn deregister(&mut self, conn: ConnectionId) {
        self.connections.remove(&conn);
        if let Some(rooms) = self.joined.remove(&conn) {
            for room in rooms {
                self.leave_room(conn, &room);
            }
        }
        debug!(%conn, "connection deregistered");
    }

    fn join(&mut self, conn: ConnectionId, room: Room) {
        if !self.connections.contains_key(&conn) {
            warn!(%conn, %room, "join from unregistered connection ignored");
            return;
        }
        // A connection speaks for one user at a time: joining a user room
        // replaces any user room it was in before.
        if room.is_user_room() {
            let previous: Vec<Room> = self
                .joined
                .get(&conn)
                .map(|rooms| {
                    rooms
                        .iter()
                        .filter(|r| r.is_user_room() && **r != room)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            for old in previous {
                self.leave_room(conn, &old);
                if let Some(rooms) = self.joined.get_mut(&conn) {
                    rooms.remove(&old);
                }
            }
        }
        debug!(%conn, %room, "joined room");
        self.rooms.entry(room.clone()).or_default().insert(conn);
        self.joined.entry(conn).or_default().insert(room);
    }

    fn leave_room(&mut self, conn: ConnectionId, room: &Room) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&conn);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }

    fn publish(&mut self, event: ChangeEvent) {
        let targets: HashSet<ConnectionId> = match &event.target {
            EventTarget::AllConnections => self.connections.keys().copied().collect(),
            EventTarget::Rooms(rooms) => rooms
                .iter()
                .filter_map(|room| self.rooms.get(room))
                .flatten()
                .copied()
                .collect(),
        };
        debug!(event = ?event.event.kind(), recipients = targets.len(), "publishing event");
        self.deliver(targets.into_iter(), event.event);
    }

    /// Typing traffic goes to everyone watching the blog list except the
    /// connection it came from.
    fn relay(&mut self, from: ConnectionId, event: ServerEvent) {
        let targets: Vec<ConnectionId> = self
            .rooms
            .get(&Room::AllBlogs)
            .map(|members| members.iter().copied().filter(|c| *c != from).collect())
            .unwrap_or_default();
        self.deliver(targets.into_iter(), event);
    }

    fn deliver(&mut self, targets: impl Iterator<Item = ConnectionId>, event: ServerEvent) {
        let mut dead = Vec::new();
        for conn in targets {
            if let Some(sender) = self.connections.get(&conn) {
                if sender.send(event.clone()).is_err() {
                    dead.push(conn);
                }
            }
        }
        // A closed channel means the socket task is gone and its
        // deregister just hasn't arrived yet.
        for conn in dead {
            debug!(%conn, "dropping connection with closed channel");
            self.deregister(conn);
        }
    }

    fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            rooms: self.rooms.len(),
        }
    }
}
