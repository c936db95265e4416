//! Node Assembly
//!
//! One process's identity plus its coordination components, and the
//! dispatcher that answers inbound peer messages. The components are
//! explicit objects owned here and shared by `Arc`; there are no
//! process-wide singletons.

use std::sync::Arc;

use serde::Serialize;

use crate::election::{ElectionCoordinator, ElectionStatus, ElectionTiming};
use crate::identity::NodeIdentity;
use crate::multicast::{MulticastLog, MulticastStatus};
use crate::mutex::{MutexStatus, MutexTiming, TokenRingMutex};
use crate::network::{MessageHandler, PeerTransport};
use crate::protocol::Message;

/// Combined status of all components on this node
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub rank: u32,
    pub cluster_size: u32,
    pub election: ElectionStatus,
    pub mutex: MutexStatus,
    pub multicast: MulticastStatus,
}

/// One coordination node: identity, election, mutex, and the multicast
/// placeholder
pub struct Node {
    identity: Arc<NodeIdentity>,
    election: Arc<ElectionCoordinator>,
    mutex: Arc<TokenRingMutex>,
    multicast: Arc<MulticastLog>,
}

impl Node {
    /// Assemble a node over the given transport
    pub fn new(
        identity: Arc<NodeIdentity>,
        transport: Arc<dyn PeerTransport>,
        election_timing: ElectionTiming,
        mutex_timing: MutexTiming,
    ) -> Self {
        let election = Arc::new(ElectionCoordinator::new(
            Arc::clone(&identity),
            Arc::clone(&transport),
            election_timing,
        ));
        let mutex = Arc::new(TokenRingMutex::new(
            Arc::clone(&identity),
            transport,
            mutex_timing,
        ));
        let multicast = Arc::new(MulticastLog::new(identity.rank()));

        Self {
            identity,
            election,
            mutex,
            multicast,
        }
    }

    /// This node's identity
    pub fn identity(&self) -> &Arc<NodeIdentity> {
        &self.identity
    }

    /// The election coordinator
    pub fn election(&self) -> &Arc<ElectionCoordinator> {
        &self.election
    }

    /// The token-ring mutex
    pub fn mutex(&self) -> &Arc<TokenRingMutex> {
        &self.mutex
    }

    /// The multicast placeholder
    pub fn multicast(&self) -> &Arc<MulticastLog> {
        &self.multicast
    }

    /// Combined status of all components
    pub async fn status(&self) -> NodeStatus {
        NodeStatus {
            rank: self.identity.rank(),
            cluster_size: self.identity.cluster_size(),
            election: self.election.status().await,
            mutex: self.mutex.status().await,
            multicast: self.multicast.status().await,
        }
    }

    /// Dispatcher for inbound peer messages: maps each wire request to the
    /// owning component and produces the response
    pub fn message_handler(&self) -> MessageHandler {
        let election = Arc::clone(&self.election);
        let mutex = Arc::clone(&self.mutex);

        Arc::new(move |message| {
            let election = Arc::clone(&election);
            let mutex = Arc::clone(&mutex);

            Box::pin(async move {
                match message {
                    Message::ElectionRequest { sender_rank } => Message::ElectionResponse {
                        ok: election.receive_election_request(sender_rank),
                    },
                    Message::CoordinatorAnnouncement { coordinator_rank } => {
                        election.receive_coordinator_announcement(coordinator_rank).await;
                        Message::Ack
                    }
                    Message::TokenTransfer { from_rank } => {
                        mutex.receive_token(from_rank).await;
                        Message::Ack
                    }
                    other => {
                        tracing::warn!(request = other.type_name(), "unexpected peer request");
                        Message::Ack
                    }
                }
            })
        })
    }
}
