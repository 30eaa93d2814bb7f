//! In-process connector for client unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::transport::{ClientError, Connector, Socket};
use crate::models::{ClientMessage, ServerEvent};

/// The server half of one fake connection.
pub(crate) struct ServerEnd {
    pub from_client: mpsc::UnboundedReceiver<ClientMessage>,
    pub to_client: mpsc::UnboundedSender<ServerEvent>,
}

/// Hands out in-process channel pairs instead of real sockets. The first
/// `fail_first` connect calls are refused; every successful connect sends
/// the matching [`ServerEnd`] to the receiver returned by [`new`].
///
/// [`new`]: ChannelConnector::new
pub(crate) struct ChannelConnector {
    fail_first: Mutex<usize>,
    attempts: Arc<AtomicUsize>,
    ends: mpsc::UnboundedSender<ServerEnd>,
}

impl ChannelConnector {
    pub(crate) fn new(
        fail_first: usize,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<ServerEnd>,
        Arc<AtomicUsize>,
    ) {
        let (ends_tx, ends_rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let connector = Self {
            fail_first: Mutex::new(fail_first),
            attempts: attempts.clone(),
            ends: ends_tx,
        };
        (connector, ends_rx, attempts)
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self) -> Result<Socket, ClientError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        {
            let mut remaining = self.fail_first.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClientError::Refused("scripted failure".to_string()));
            }
        }

        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let _ = self.ends.send(ServerEnd {
            from_client: server_rx,
            to_client: server_tx,
        });
        Ok(Socket {
            tx: client_tx,
            rx: client_rx,
        })
    }
}
