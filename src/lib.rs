//! Ringleader - Distributed Leader Election and Token-Ring Mutual Exclusion
//!
//! Each process in a fixed-size cluster of N symmetric nodes runs one
//! Ringleader node, identified by an integer rank `0..N-1`. The nodes agree
//! on a single leader and serialize access to a shared critical resource
//! without any central coordinator.
//!
//! # Architecture
//!
//! Two independent protocol components run inside every node and share
//! nothing but the peer transport:
//!
//! - Leader election uses the Bully algorithm: the highest-ranked reachable
//!   process always wins.
//! - Mutual exclusion uses a token ring: a single token circulates in rank
//!   order, and possession of the token is the lock.
//!
//! Peers exchange small bincode-framed messages over TCP; an HTTP API is
//! the operator boundary for triggering elections, requesting the critical
//! section, and reading status.

pub mod api;
pub mod config;
pub mod election;
pub mod error;
pub mod identity;
pub mod multicast;
pub mod mutex;
pub mod network;
pub mod node;
pub mod protocol;

pub use config::RingleaderConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::RingleaderConfig;
    pub use crate::election::{ElectionCoordinator, ElectionStatus, ElectionTiming};
    pub use crate::error::{Error, Result};
    pub use crate::identity::NodeIdentity;
    pub use crate::multicast::MulticastLog;
    pub use crate::mutex::{MutexStatus, MutexTiming, TokenRingMutex};
    pub use crate::network::{NetworkClient, NetworkServer, PeerTransport};
    pub use crate::node::{Node, NodeStatus};
    pub use crate::protocol::Message;
}
