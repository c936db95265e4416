//! Network Client
//!
//! TCP client for calling peer nodes. Each call opens a fresh connection,
//! exchanges one request/response pair, and closes; the whole exchange runs
//! under the caller's timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{read_message, write_message, PeerTransport};
use crate::error::{Error, Result};
use crate::identity::NodeIdentity;
use crate::protocol::Message;

/// TCP transport to peer nodes, resolving ranks through the identity's
/// peer table
pub struct NetworkClient {
    identity: Arc<NodeIdentity>,
    connect_timeout: Duration,
}

impl NetworkClient {
    /// Create a new network client
    pub fn new(identity: Arc<NodeIdentity>, connect_timeout: Duration) -> Self {
        Self {
            identity,
            connect_timeout,
        }
    }

    /// Connect to an address
    async fn connect(&self, address: &str) -> Result<TcpStream> {
        let result = timeout(self.connect_timeout, TcpStream::connect(address)).await;

        match result {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(e)) => Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }

    /// One request/response exchange on a fresh connection
    async fn exchange(&self, address: &str, message: &Message) -> Result<Message> {
        let stream = self.connect(address).await?;
        let (mut reader, mut writer) = stream.into_split();

        write_message(&mut writer, message).await?;
        read_message(&mut reader).await
    }
}

#[async_trait]
impl PeerTransport for NetworkClient {
    async fn send(&self, rank: u32, message: Message, deadline: Duration) -> Result<Message> {
        let address = self.identity.peer_address(rank)?.to_string();

        tracing::trace!(rank, %address, request = message.type_name(), "sending");

        match timeout(deadline, self.exchange(&address, &message)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionTimeout(address)),
        }
    }
}
