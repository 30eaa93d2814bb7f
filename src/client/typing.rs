//! Typing indicator plumbing for both directions: debounced start/stop
//! signals around local keystrokes, and a roster of remote typists with
//! client-side expiry.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::session::SocketClient;
use crate::models::{ServerEvent, TypingAction, TypingStarted};

/// Idle window after the last keystroke before stop is emitted.
const TYPING_IDLE: Duration = Duration::from_secs(2);

/// How long a received typing signal stays visible without a refresh or
/// an explicit stop.
const TYPING_TTL: Duration = Duration::from_secs(3);

enum Signal {
    Input,
    Stop,
}

/// Emits `user-typing` on the first keystroke of a burst and
/// `user-stopped-typing` exactly once when the burst ends, either through
/// [`TypingIndicator::stop`] or after [`TYPING_IDLE`] of inactivity.
/// Dropping the indicator mid-burst also emits the stop.
pub struct TypingIndicator {
    tx: mpsc::UnboundedSender<Signal>,
}

impl TypingIndicator {
    pub fn spawn(
        client: SocketClient,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        action: TypingAction,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(client, user_id.into(), user_name.into(), action, rx));
        Self { tx }
    }

    /// Call on every keystroke.
    pub fn input(&self) {
        let _ = self.tx.send(Signal::Input);
    }

    /// End the burst now (blur, submit).
    pub fn stop(&self) {
        let _ = self.tx.send(Signal::Stop);
    }
}

async fn idle_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn run(
    client: SocketClient,
    user_id: String,
    user_name: String,
    action: TypingAction,
    mut rx: mpsc::UnboundedReceiver<Signal>,
) {
    let mut typing = false;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            signal = rx.recv() => match signal {
                Some(Signal::Input) => {
                    if !typing {
                        client.emit_typing(&user_id, &user_name, action);
                        typing = true;
                    }
                    deadline = Some(Instant::now() + TYPING_IDLE);
                }
                Some(Signal::Stop) => {
                    if typing {
                        client.emit_stopped_typing(&user_id);
                        typing = false;
                    }
                    deadline = None;
                }
                None => break,
            },
            () = idle_elapsed(deadline) => {
                if typing {
                    client.emit_stopped_typing(&user_id);
                    typing = false;
                }
                deadline = None;
            }
        }
    }

    // The handle was dropped mid-burst.
    if typing {
        client.emit_stopped_typing(&user_id);
    }
}

struct TypingEntry {
    user_name: String,
    action: TypingAction,
    expires_at: Instant,
}

/// One remote typist, as shown in the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct TypingUser {
    pub user_id: String,
    pub user_name: String,
    pub action: TypingAction,
}

/// Who is typing right now, as seen by one client. A signal stays active
/// for [`TYPING_TTL`] unless refreshed; a stop clears it immediately. The
/// server never expires these, so the roster must.
pub struct TypingRoster {
    entries: HashMap<String, TypingEntry>,
    ttl: Duration,
}

impl Default for TypingRoster {
    fn default() -> Self {
        Self::new()
    }
}

impl TypingRoster {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            ttl: TYPING_TTL,
        }
    }

    /// Fold a hub event into the roster. Non-typing events are ignored.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::UserTyping(signal) => self.observe(signal),
            ServerEvent::UserStoppedTyping(stopped) => self.clear(&stopped.user_id),
            _ => {}
        }
    }

    pub fn observe(&mut self, signal: &TypingStarted) {
        self.entries.insert(
            signal.user_id.clone(),
            TypingEntry {
                user_name: signal.user_name.clone(),
                action: signal.action,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn clear(&mut self, user_id: &str) {
        self.entries.remove(user_id);
    }

    /// Everyone still typing, stale entries pruned, ordered by user id.
    pub fn active(&mut self) -> Vec<TypingUser> {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let mut users: Vec<TypingUser> = self
            .entries
            .iter()
            .map(|(user_id, entry)| TypingUser {
                user_id: user_id.clone(),
                user_name: entry.user_name.clone(),
                action: entry.action,
            })
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }
}
