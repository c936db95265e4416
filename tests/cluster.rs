//! Cluster scenarios over an in-process transport: three nodes whose
//! message dispatchers are wired directly to each other, so whole protocol
//! rounds run without touching a socket.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ringleader::election::ElectionTiming;
use ringleader::error::{Error, Result};
use ringleader::identity::NodeIdentity;
use ringleader::mutex::MutexTiming;
use ringleader::network::{MessageHandler, PeerTransport};
use ringleader::node::Node;
use ringleader::protocol::Message;

/// Shared in-process "network": rank -> dispatcher, a set of downed ranks,
/// and a log of delivered sends.
#[derive(Default)]
struct LocalNet {
    handlers: Mutex<HashMap<u32, MessageHandler>>,
    down: Mutex<HashSet<u32>>,
    sends: Mutex<Vec<(u32, &'static str)>>,
}

impl LocalNet {
    fn register(&self, rank: u32, handler: MessageHandler) {
        self.handlers.lock().unwrap().insert(rank, handler);
    }

    fn take_down(&self, rank: u32) {
        self.down.lock().unwrap().insert(rank);
    }

    fn sends(&self) -> Vec<(u32, &'static str)> {
        self.sends.lock().unwrap().clone()
    }
}

/// Transport that routes a request straight into the target node's
/// dispatcher. Downed ranks time out.
struct LocalTransport {
    net: Arc<LocalNet>,
}

#[async_trait]
impl PeerTransport for LocalTransport {
    async fn send(&self, rank: u32, message: Message, _timeout: Duration) -> Result<Message> {
        if self.net.down.lock().unwrap().contains(&rank) {
            return Err(Error::ConnectionTimeout(format!("rank {}", rank)));
        }

        let handler = self
            .net
            .handlers
            .lock()
            .unwrap()
            .get(&rank)
            .cloned()
            .ok_or(Error::UnknownRank(rank))?;

        self.net
            .sends
            .lock()
            .unwrap()
            .push((rank, message.type_name()));

        Ok(handler(message).await)
    }
}

/// Build an N-node cluster with fast protocol timings.
fn cluster(n: u32) -> (Arc<LocalNet>, Vec<Arc<Node>>) {
    let net = Arc::new(LocalNet::default());
    let mut nodes = Vec::new();

    for rank in 0..n {
        let peers = (0..n).map(|r| format!("local:{}", r)).collect();
        let identity = Arc::new(NodeIdentity::new(rank, n, peers).unwrap());
        let transport: Arc<dyn PeerTransport> = Arc::new(LocalTransport {
            net: Arc::clone(&net),
        });

        let node = Arc::new(Node::new(
            identity,
            transport,
            ElectionTiming {
                request_timeout: Duration::from_millis(100),
                announce_timeout: Duration::from_millis(100),
                retry_delay: Duration::from_millis(10),
            },
            MutexTiming {
                transfer_timeout: Duration::from_millis(100),
                hold_time: Duration::from_millis(30),
            },
        ));

        net.register(rank, node.message_handler());
        nodes.push(node);
    }

    (net, nodes)
}

#[tokio::test]
async fn test_bully_converges_on_the_highest_rank() {
    let (_net, nodes) = cluster(3);

    // The lowest rank kicks things off; deference cascades to rank 2
    nodes[0].election().start_election().await;

    let mut converged = false;
    for _ in 0..100 {
        let mut agreed = 0;
        for node in &nodes {
            let status = node.election().status().await;
            if status.coordinator_rank == Some(2) && !status.election_in_progress {
                agreed += 1;
            }
        }
        if agreed == nodes.len() {
            converged = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(converged, "cluster never agreed on rank 2");

    // Exactly one node believes it is the coordinator
    let mut coordinators = 0;
    for node in &nodes {
        if node.election().status().await.is_coordinator {
            coordinators += 1;
        }
    }
    assert_eq!(coordinators, 1);
    assert!(nodes[2].election().status().await.is_coordinator);
}

#[tokio::test]
async fn test_highest_rank_elects_itself_with_all_peers_down() {
    let (net, nodes) = cluster(3);
    net.take_down(0);
    net.take_down(1);

    nodes[2].election().start_election().await;

    let status = nodes[2].election().status().await;
    assert_eq!(status.coordinator_rank, Some(2));
    assert!(status.is_coordinator);
    assert!(!status.election_in_progress);

    // Self-election sends no challenges, only (failed) announcements
    assert!(net.sends().iter().all(|(_, t)| *t != "ElectionRequest"));
}

#[tokio::test]
async fn test_election_terminates_under_total_peer_silence() {
    let (net, nodes) = cluster(3);
    net.take_down(1);
    net.take_down(2);

    // Worst case: alone in the cluster, therefore coordinator
    nodes[0].election().start_election().await;

    let status = nodes[0].election().status().await;
    assert!(status.is_coordinator);
    assert!(!status.election_in_progress);
}

#[tokio::test]
async fn test_token_travels_the_ring_to_the_waiting_node() {
    let (net, nodes) = cluster(3);

    // Rank 1 wants the critical section; rank 0 holds the idle token
    nodes[1].mutex().request_access().await;
    assert_eq!(nodes[1].mutex().status().await.entries, 0);

    // Releasing the unused token starts the rotation
    nodes[0].mutex().release_access().await;

    let mut served = false;
    for _ in 0..100 {
        if nodes[1].mutex().status().await.entries == 1 {
            served = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(served, "the token never reached rank 1");

    // First hop 0 -> 1, then onward to 2 after the critical section
    let transfers: Vec<u32> = net
        .sends()
        .iter()
        .filter(|(_, t)| *t == "TokenTransfer")
        .map(|(rank, _)| *rank)
        .collect();
    assert!(transfers.len() >= 2);
    assert_eq!(transfers[0], 1);
    assert_eq!(transfers[1], 2);
}

#[tokio::test]
async fn test_critical_sections_never_overlap() {
    let (_net, nodes) = cluster(3);

    nodes[1].mutex().request_access().await;
    nodes[2].mutex().request_access().await;
    nodes[0].mutex().release_access().await;

    let mut max_occupancy = 0;
    for _ in 0..150 {
        let mut occupancy = 0;
        for node in &nodes {
            if node.mutex().status().await.in_critical_section {
                occupancy += 1;
            }
        }
        max_occupancy = max_occupancy.max(occupancy);

        let served_1 = nodes[1].mutex().status().await.entries >= 1;
        let served_2 = nodes[2].mutex().status().await.entries >= 1;
        if served_1 && served_2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(max_occupancy <= 1, "two nodes were in the critical section");
    assert!(nodes[1].mutex().status().await.entries >= 1);
    assert!(nodes[2].mutex().status().await.entries >= 1);
}

#[tokio::test]
async fn test_token_stalls_at_a_dead_successor_but_is_conserved() {
    let (net, nodes) = cluster(3);
    net.take_down(1);

    // Rank 0 tries to hand the token to its dead successor
    nodes[0].mutex().release_access().await;

    // The transfer failed, so the token must be back at rank 0
    let status = nodes[0].mutex().status().await;
    assert!(status.has_token);

    // And nobody else ever saw it
    assert_eq!(nodes[1].mutex().status().await.has_token, false);
    assert_eq!(nodes[2].mutex().status().await.has_token, false);
}
