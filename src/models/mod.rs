//! Data models: views, request bodies, rooms, and wire events.

pub mod blog;
pub mod event;
pub mod room;
pub mod user;

pub use blog::*;
pub use event::*;
pub use room::*;
pub use user::*;
