//! Ringleader Error Types

use thiserror::Error;

/// Result type alias for Ringleader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ringleader error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Codec errors
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    // Cluster errors
    #[error("Unknown rank: {0}")]
    UnknownRank(u32),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error counts as peer silence: an unreachable peer, a
    /// timed-out call, or a reply that could not be decoded. The election
    /// treats these as "no objection"; the mutex treats them as a failed
    /// token transfer.
    pub fn is_peer_failure(&self) -> bool {
        matches!(
            self,
            Error::Codec(_)
                | Error::MalformedFrame(_)
                | Error::Network(_)
                | Error::ConnectionFailed { .. }
                | Error::ConnectionTimeout(_)
                | Error::Io(_)
        )
    }
}
