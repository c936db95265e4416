//! Coordination Protocol
//!
//! Defines the wire messages exchanged between nodes and the frame layout
//! used to carry them over TCP.

use serde::{Deserialize, Serialize};

/// Largest frame body a node will accept. Coordination messages are a few
/// bytes; anything bigger is garbage or a framing bug.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

/// Protocol messages for node communication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    // ========== Leader Election ==========
    /// Bully challenge from a lower-ranked node
    ElectionRequest { sender_rank: u32 },

    /// Reply to a challenge: true iff the callee outranks the sender
    ElectionResponse { ok: bool },

    /// New coordinator announcement, sent to every other rank
    CoordinatorAnnouncement { coordinator_rank: u32 },

    // ========== Mutual Exclusion ==========
    /// The mutual-exclusion token, handed to the ring successor
    TokenTransfer { from_rank: u32 },

    // ========== Generic ==========
    /// Bare acknowledgement
    Ack,
}

impl Message {
    /// Serialize message to bytes
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize message from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Get the message type name (for logging)
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::ElectionRequest { .. } => "ElectionRequest",
            Message::ElectionResponse { .. } => "ElectionResponse",
            Message::CoordinatorAnnouncement { .. } => "CoordinatorAnnouncement",
            Message::TokenTransfer { .. } => "TokenTransfer",
            Message::Ack => "Ack",
        }
    }
}

/// Frame header for length-prefixed messages
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Body length in bytes
    pub length: u32,
    /// CRC32 of the body
    pub checksum: u32,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 8;

    /// Build the header for a frame body
    pub fn for_body(body: &[u8]) -> Self {
        Self {
            length: body.len() as u32,
            checksum: crc32fast::hash(body),
        }
    }

    /// Check a received body against the header checksum
    pub fn matches(&self, body: &[u8]) -> bool {
        crc32fast::hash(body) == self.checksum
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            length: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            checksum: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
        }
    }
}
