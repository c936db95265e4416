//! Network Module
//!
//! Framed message exchange between nodes, and the transport seam the
//! protocol components talk through.

mod client;
mod server;

pub use client::NetworkClient;
pub use server::{MessageHandler, NetworkServer};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::protocol::{FrameHeader, Message, MAX_FRAME_LEN};

/// Request/response channel to a peer identified by rank.
///
/// Every call carries its own timeout; the timeout is the only cancellation
/// mechanism. Implementations report peer silence and undecodable replies
/// through errors that satisfy [`Error::is_peer_failure`].
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send a request to the peer at `rank` and wait for its response
    async fn send(&self, rank: u32, message: Message, timeout: Duration) -> Result<Message>;
}

/// Read a framed message from a reader
pub async fn read_message<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    use tokio::io::AsyncReadExt;

    // Read header
    let mut header_bytes = [0u8; FrameHeader::SIZE];
    reader.read_exact(&mut header_bytes).await?;
    let header = FrameHeader::from_bytes(&header_bytes);

    if header.length > MAX_FRAME_LEN {
        return Err(Error::MalformedFrame(format!(
            "body of {} bytes exceeds the {} byte limit",
            header.length, MAX_FRAME_LEN
        )));
    }

    // Read body
    let mut body = vec![0u8; header.length as usize];
    reader.read_exact(&mut body).await?;

    // Verify checksum
    if !header.matches(&body) {
        return Err(Error::MalformedFrame("checksum mismatch".into()));
    }

    Ok(Message::deserialize(&body)?)
}

/// Write a framed message to a writer
pub async fn write_message<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let body = message.serialize()?;
    let header = FrameHeader::for_body(&body);

    writer.write_all(&header.to_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        write_message(&mut a, &Message::CoordinatorAnnouncement { coordinator_rank: 2 })
            .await
            .unwrap();

        let received = read_message(&mut b).await.unwrap();
        match received {
            Message::CoordinatorAnnouncement { coordinator_rank } => {
                assert_eq!(coordinator_rank, 2)
            }
            other => panic!("wrong message type: {}", other.type_name()),
        }
    }

    #[tokio::test]
    async fn test_rejects_corrupted_frame() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        let body = Message::Ack.serialize().unwrap();
        let mut header = FrameHeader::for_body(&body);
        header.checksum ^= 0xdead_beef;

        a.write_all(&header.to_bytes()).await.unwrap();
        a.write_all(&body).await.unwrap();

        let err = read_message(&mut b).await.unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
        assert!(err.is_peer_failure());
    }

    #[tokio::test]
    async fn test_rejects_oversized_frame() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        let header = FrameHeader {
            length: MAX_FRAME_LEN + 1,
            checksum: 0,
        };
        a.write_all(&header.to_bytes()).await.unwrap();

        let err = read_message(&mut b).await.unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }
}
