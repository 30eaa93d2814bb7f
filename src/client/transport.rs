//! Client transport: turns a server URL into a pair of message channels.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::debug;

use crate::models::{ClientMessage, ServerEvent};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("connection refused: {0}")]
    Refused(String),
}

/// A live connection: client messages go out through `tx`, server events
/// come in through `rx`. The connection is gone when `rx` yields `None`.
pub struct Socket {
    pub tx: mpsc::UnboundedSender<ClientMessage>,
    pub rx: mpsc::UnboundedReceiver<ServerEvent>,
}

/// Opens connections for a [`super::SocketClient`]. Swappable so tests can
/// wire a session straight into an in-process hub.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Socket, ClientError>;
}

/// Connects over a real websocket and pumps frames to and from JSON.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Socket, ClientError> {
        let (stream, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut source) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<ServerEvent>();

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(_) => continue,
                };
                if sink.send(tungstenite::Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(Ok(msg)) = source.next().await {
                if let tungstenite::Message::Text(text) = msg {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if in_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!(error = %e, "ignoring malformed server event"),
                    }
                }
            }
        });

        Ok(Socket {
            tx: out_tx,
            rx: in_rx,
        })
    }
}
