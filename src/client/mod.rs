//! In-process mirror of the browser client: a reconnecting socket session
//! with a listener registry, the typing indicator, and a live blog list.

mod feed;
mod session;
#[cfg(test)]
pub(crate) mod testsupport;
mod transport;
mod typing;

pub use feed::LiveBlogList;
pub use session::{ConnectionStatus, SocketClient};
pub use transport::{ClientError, Connector, Socket, WsConnector};
pub use typing::{TypingIndicator, TypingRoster, TypingUser};
