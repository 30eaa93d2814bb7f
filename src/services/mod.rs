pub mod hub;

pub use hub::{ConnectionId, EventHub, HubStats};
