//! Room names and naming conventions.

use std::fmt;

/// A named broadcast group of currently-connected clients.
///
/// Rooms come in two kinds: the singleton feed of all blog activity, and a
/// per-user room keyed by the user's identifier. Rooms exist implicitly:
/// created on first join, gone when their last member leaves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// Every client interested in the shared blog feed.
    AllBlogs,
    /// Personal notifications for one user (`user-<id>`).
    User(String),
}

impl Room {
    pub fn user(id: impl Into<String>) -> Self {
        Room::User(id.into())
    }

    /// Wire name of the room (`all-blogs`, `user-<id>`).
    pub fn name(&self) -> String {
        match self {
            Room::AllBlogs => "all-blogs".to_string(),
            Room::User(id) => format!("user-{}", id),
        }
    }

    pub fn is_user_room(&self) -> bool {
        matches!(self, Room::User(_))
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
