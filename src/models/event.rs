//! Wire messages exchanged with the hub, and change events produced by
//! domain operations.
//!
//! Everything on the wire is a JSON text frame shaped `{"event": <name>,
//! "data": <payload>}`; the names below are the protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::blog::BlogView;
use super::room::Room;
use super::user::UserView;

/// Message a client sends over its hub connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join the personal room for the given user id. The id is asserted by
    /// the client itself; there is no verification (known gap, kept as the
    /// existing contract).
    JoinUserRoom(String),
    /// Join the shared blog feed room.
    JoinBlogsRoom,
    /// The user started composing or editing a blog.
    UserTyping(TypingStarted),
    /// The user stopped composing.
    UserStoppedTyping(TypingStopped),
}

/// Event the hub pushes to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    NewBlog(BlogEventPayload),
    BlogUpdated(BlogEventPayload),
    BlogDeleted(BlogDeletedPayload),
    ProfileUpdated(ProfileUpdatedPayload),
    UserLoggedIn(UserLoggedInPayload),
    NewUserRegistered(UserRegisteredPayload),
    UserTyping(TypingStarted),
    UserStoppedTyping(TypingStopped),
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::NewBlog(_) => EventKind::NewBlog,
            ServerEvent::BlogUpdated(_) => EventKind::BlogUpdated,
            ServerEvent::BlogDeleted(_) => EventKind::BlogDeleted,
            ServerEvent::ProfileUpdated(_) => EventKind::ProfileUpdated,
            ServerEvent::UserLoggedIn(_) => EventKind::UserLoggedIn,
            ServerEvent::NewUserRegistered(_) => EventKind::NewUserRegistered,
            ServerEvent::UserTyping(_) => EventKind::UserTyping,
            ServerEvent::UserStoppedTyping(_) => EventKind::UserStoppedTyping,
        }
    }
}

/// Discriminant of [`ServerEvent`], used to key client-side listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewBlog,
    BlogUpdated,
    BlogDeleted,
    ProfileUpdated,
    UserLoggedIn,
    NewUserRegistered,
    UserTyping,
    UserStoppedTyping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogEventPayload {
    pub blog: BlogView,
    pub message: String,
}

/// Carries only the id: the entity no longer exists when this is emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogDeletedPayload {
    pub blog_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdatedPayload {
    pub user: UserView,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLoggedInPayload {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegisteredPayload {
    pub message: String,
    pub user_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStarted {
    pub user_id: String,
    pub user_name: String,
    pub action: TypingAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStopped {
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypingAction {
    Creating,
    Editing,
}

/// Where a change event is delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTarget {
    /// Every connection currently in any of the listed rooms (union; a
    /// connection in several target rooms still receives one copy).
    Rooms(Vec<Room>),
    /// Every connected client, joined to a room or not.
    AllConnections,
}

/// A fire-and-forget notification describing one completed, committed
/// mutation. Constructed only after the store acknowledged the write.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub target: EventTarget,
    pub event: ServerEvent,
}

impl ChangeEvent {
    pub fn new_blog(blog: BlogView) -> Self {
        let message = format!(
            "New blog \"{}\" published by {}",
            blog.title, blog.user.name
        );
        let target = EventTarget::Rooms(vec![Room::AllBlogs, Room::user(blog.user.id.to_string())]);
        Self {
            target,
            event: ServerEvent::NewBlog(BlogEventPayload { blog, message }),
        }
    }

    pub fn blog_updated(blog: BlogView) -> Self {
        let message = format!("Blog \"{}\" has been updated", blog.title);
        let target = EventTarget::Rooms(vec![Room::AllBlogs, Room::user(blog.user.id.to_string())]);
        Self {
            target,
            event: ServerEvent::BlogUpdated(BlogEventPayload { blog, message }),
        }
    }

    pub fn blog_deleted(blog_id: Uuid, title: &str, author_id: Uuid) -> Self {
        let message = format!("Blog \"{}\" has been deleted", title);
        let target = EventTarget::Rooms(vec![Room::AllBlogs, Room::user(author_id.to_string())]);
        Self {
            target,
            event: ServerEvent::BlogDeleted(BlogDeletedPayload {
                blog_id: blog_id.to_string(),
                message,
            }),
        }
    }

    pub fn profile_updated(user: UserView) -> Self {
        let target = EventTarget::Rooms(vec![Room::user(user.id.to_string())]);
        Self {
            target,
            event: ServerEvent::ProfileUpdated(ProfileUpdatedPayload {
                user,
                message: "Your profile has been updated successfully!".to_string(),
            }),
        }
    }

    pub fn user_logged_in(user_id: Uuid, name: &str) -> Self {
        let target = EventTarget::Rooms(vec![Room::user(user_id.to_string())]);
        Self {
            target,
            event: ServerEvent::UserLoggedIn(UserLoggedInPayload {
                message: format!("Welcome back, {}!", name),
                timestamp: Utc::now(),
            }),
        }
    }

    pub fn user_registered(name: &str, user_count: i64) -> Self {
        Self {
            target: EventTarget::AllConnections,
            event: ServerEvent::NewUserRegistered(UserRegisteredPayload {
                message: format!("Welcome {} to BLOGGY!", name),
                user_count,
            }),
        }
    }
}
