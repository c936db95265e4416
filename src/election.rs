//! Leader Election
//!
//! Implements Bully-style leader election: the highest-ranked reachable
//! process wins. A node starting a round challenges every higher rank
//! concurrently; any objection makes it defer and wait for the winner's
//! announcement, total silence makes it take coordination itself.
//!
//! Announcements carry no term number. A delayed announcement from an older
//! round therefore overwrites a newer one (last writer wins). Known gap,
//! kept until the protocol grows epochs.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::identity::NodeIdentity;
use crate::network::PeerTransport;
use crate::protocol::Message;

/// Election timing configuration
#[derive(Debug, Clone)]
pub struct ElectionTiming {
    /// Per-peer timeout on a challenge request
    pub request_timeout: Duration,
    /// Per-peer timeout on the coordinator announcement
    pub announce_timeout: Duration,
    /// Delay before a challenged node starts its own round
    pub retry_delay: Duration,
}

impl Default for ElectionTiming {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(2000),
            announce_timeout: Duration::from_millis(3000),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Read-only election status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ElectionStatus {
    pub rank: u32,
    pub coordinator_rank: Option<u32>,
    pub is_coordinator: bool,
    pub election_in_progress: bool,
}

/// Election coordinator: owns this node's belief about who the current
/// coordinator is and whether an election round is locally active
pub struct ElectionCoordinator {
    /// This node's identity
    identity: Arc<NodeIdentity>,
    /// Transport to peers
    transport: Arc<dyn PeerTransport>,
    /// Timing configuration
    timing: ElectionTiming,
    /// Known coordinator (None until the first round completes)
    coordinator_rank: RwLock<Option<u32>>,
    /// Reentrancy guard for the local round
    election_in_progress: RwLock<bool>,
}

impl ElectionCoordinator {
    /// Create a new election coordinator
    pub fn new(
        identity: Arc<NodeIdentity>,
        transport: Arc<dyn PeerTransport>,
        timing: ElectionTiming,
    ) -> Self {
        Self {
            identity,
            transport,
            timing,
            coordinator_rank: RwLock::new(None),
            election_in_progress: RwLock::new(false),
        }
    }

    /// Run one Bully round.
    ///
    /// A call while a round is already active is a silent no-op. The round
    /// always terminates locally: every challenge carries its own timeout,
    /// and per-peer failures count as "no objection".
    pub async fn start_election(&self) {
        {
            let mut in_progress = self.election_in_progress.write().await;
            if *in_progress {
                tracing::debug!(
                    rank = self.identity.rank(),
                    "election already in progress, ignoring"
                );
                return;
            }
            *in_progress = true;
        }

        tracing::info!(rank = self.identity.rank(), "starting election round");

        let higher = self.identity.higher_ranks();
        if higher.is_empty() {
            // Nobody outranks us
            tracing::info!(
                rank = self.identity.rank(),
                "highest rank in the cluster, taking coordination"
            );
            self.become_coordinator().await;
            return;
        }

        tracing::info!(
            rank = self.identity.rank(),
            targets = ?higher,
            "challenging higher ranks"
        );

        let challenges = higher.into_iter().map(|peer| {
            let challenge = Message::ElectionRequest {
                sender_rank: self.identity.rank(),
            };
            async move {
                match self
                    .transport
                    .send(peer, challenge, self.timing.request_timeout)
                    .await
                {
                    Ok(Message::ElectionResponse { ok }) => ok,
                    Ok(other) => {
                        tracing::warn!(
                            peer,
                            reply = other.type_name(),
                            "unexpected reply to challenge, counting as no objection"
                        );
                        false
                    }
                    Err(e) => {
                        tracing::debug!(peer, "no objection from rank {}: {}", peer, e);
                        false
                    }
                }
            }
        });

        let objected = join_all(challenges).await.into_iter().any(|ok| ok);

        if objected {
            // A higher rank is alive; its own round will announce the winner
            tracing::info!(
                rank = self.identity.rank(),
                "a higher rank objected, awaiting coordinator announcement"
            );
            *self.election_in_progress.write().await = false;
        } else {
            tracing::info!(rank = self.identity.rank(), "no higher rank objected");
            self.become_coordinator().await;
        }
    }

    /// Answer a Bully challenge from `sender_rank`.
    ///
    /// Outranking the sender objects (returns true) and schedules this
    /// node's own round after a short delay, letting an in-flight
    /// higher-priority round settle first. The reply never waits on the
    /// scheduled round. A lower or equal rank yields with false.
    pub fn receive_election_request(self: Arc<Self>, sender_rank: u32) -> bool {
        tracing::info!(
            rank = self.identity.rank(),
            sender_rank,
            "election challenge received"
        );

        if self.identity.rank() > sender_rank {
            let delay = self.timing.retry_delay;
            let coordinator = Arc::clone(&self);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                coordinator.start_election().await;
            });
            true
        } else {
            false
        }
    }

    /// Take coordination and announce it to every other rank.
    ///
    /// Announcement failures are logged and ignored: no retry, no rollback.
    /// A peer that misses the announcement learns the coordinator lazily on
    /// its next election round.
    pub async fn become_coordinator(&self) {
        *self.coordinator_rank.write().await = Some(self.identity.rank());
        *self.election_in_progress.write().await = false;

        tracing::info!(rank = self.identity.rank(), "assuming coordination");

        let announcements = self.identity.peer_ranks().into_iter().map(|peer| {
            let announcement = Message::CoordinatorAnnouncement {
                coordinator_rank: self.identity.rank(),
            };
            async move {
                if let Err(e) = self
                    .transport
                    .send(peer, announcement, self.timing.announce_timeout)
                    .await
                {
                    tracing::warn!(peer, "announcement to rank {} failed: {}", peer, e);
                }
            }
        });

        join_all(announcements).await;
    }

    /// Record a coordinator announcement.
    ///
    /// Last writer wins: with no term number, a delayed announcement from a
    /// superseded round can overwrite a newer coordinator.
    pub async fn receive_coordinator_announcement(&self, coordinator_rank: u32) {
        tracing::info!(
            rank = self.identity.rank(),
            coordinator_rank,
            "coordinator announced"
        );

        *self.coordinator_rank.write().await = Some(coordinator_rank);
        *self.election_in_progress.write().await = false;
    }

    /// Read-only status snapshot
    pub async fn status(&self) -> ElectionStatus {
        let coordinator_rank = *self.coordinator_rank.read().await;
        ElectionStatus {
            rank: self.identity.rank(),
            coordinator_rank,
            is_coordinator: coordinator_rank == Some(self.identity.rank()),
            election_in_progress: *self.election_in_progress.read().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Transport double: answers from a per-rank script and records every
    /// send. Ranks without a scripted reply time out.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<HashMap<u32, Message>>,
        sent: Mutex<Vec<(u32, Message)>>,
        delay: Option<Duration>,
    }

    impl ScriptedTransport {
        fn reply(self, rank: u32, message: Message) -> Self {
            self.replies.lock().unwrap().insert(rank, message);
            self
        }

        fn sent_types(&self) -> Vec<(u32, &'static str)> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(rank, m)| (*rank, m.type_name()))
                .collect()
        }
    }

    #[async_trait]
    impl PeerTransport for ScriptedTransport {
        async fn send(&self, rank: u32, message: Message, _timeout: Duration) -> Result<Message> {
            self.sent.lock().unwrap().push((rank, message));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.replies.lock().unwrap().get(&rank) {
                Some(reply) => Ok(reply.clone()),
                None => Err(Error::ConnectionTimeout(format!("rank {}", rank))),
            }
        }
    }

    fn identity(rank: u32, cluster_size: u32) -> Arc<NodeIdentity> {
        let peers = (0..cluster_size).map(|r| format!("127.0.0.1:{}", 7600 + r)).collect();
        Arc::new(NodeIdentity::new(rank, cluster_size, peers).unwrap())
    }

    fn quick_timing() -> ElectionTiming {
        ElectionTiming {
            request_timeout: Duration::from_millis(100),
            announce_timeout: Duration::from_millis(100),
            retry_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_highest_rank_self_elects_without_challenges() {
        let transport = Arc::new(ScriptedTransport::default());
        let election = ElectionCoordinator::new(identity(2, 3), transport.clone(), quick_timing());

        election.start_election().await;

        let status = election.status().await;
        assert_eq!(status.coordinator_rank, Some(2));
        assert!(status.is_coordinator);
        assert!(!status.election_in_progress);

        // Announcements only, never a challenge
        let sent = transport.sent_types();
        assert_eq!(
            sent,
            vec![(0, "CoordinatorAnnouncement"), (1, "CoordinatorAnnouncement")]
        );
    }

    #[tokio::test]
    async fn test_total_silence_means_self_coordination() {
        // No scripted replies: both higher ranks time out
        let transport = Arc::new(ScriptedTransport::default());
        let election = ElectionCoordinator::new(identity(0, 3), transport.clone(), quick_timing());

        election.start_election().await;

        let status = election.status().await;
        assert_eq!(status.coordinator_rank, Some(0));
        assert!(status.is_coordinator);
        assert!(!status.election_in_progress);
    }

    #[tokio::test]
    async fn test_defers_when_a_higher_rank_objects() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .reply(1, Message::ElectionResponse { ok: true }),
        );
        let election = ElectionCoordinator::new(identity(0, 3), transport.clone(), quick_timing());

        election.start_election().await;

        let status = election.status().await;
        assert_eq!(status.coordinator_rank, None);
        assert!(!status.is_coordinator);
        assert!(!status.election_in_progress);
    }

    #[tokio::test]
    async fn test_refusals_count_as_no_objection() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .reply(1, Message::ElectionResponse { ok: false })
                .reply(2, Message::ElectionResponse { ok: false }),
        );
        let election = ElectionCoordinator::new(identity(0, 3), transport.clone(), quick_timing());

        election.start_election().await;

        assert!(election.status().await.is_coordinator);
    }

    #[tokio::test]
    async fn test_challenge_deference() {
        let transport = Arc::new(ScriptedTransport::default());
        let election = Arc::new(ElectionCoordinator::new(
            identity(1, 3),
            transport,
            quick_timing(),
        ));

        // Outranks sender 0: objects
        assert!(Arc::clone(&election).receive_election_request(0));
        // Outranked by sender 2: yields
        assert!(!Arc::clone(&election).receive_election_request(2));
    }

    #[tokio::test]
    async fn test_reentrant_round_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let election = Arc::new(ElectionCoordinator::new(
            identity(0, 3),
            transport.clone(),
            quick_timing(),
        ));

        let first = {
            let election = Arc::clone(&election);
            tokio::spawn(async move { election.start_election().await })
        };

        // Give the first round time to claim the guard and block on I/O
        tokio::time::sleep(Duration::from_millis(30)).await;
        election.start_election().await;
        first.await.unwrap();

        // Two challenges from the first round; the reentrant call sent none
        let challenges = transport
            .sent_types()
            .iter()
            .filter(|(_, t)| *t == "ElectionRequest")
            .count();
        assert_eq!(challenges, 2);
    }

    #[tokio::test]
    async fn test_announcement_is_last_writer_wins() {
        let transport = Arc::new(ScriptedTransport::default());
        let election = ElectionCoordinator::new(identity(0, 3), transport, quick_timing());

        election.receive_coordinator_announcement(2).await;
        election.receive_coordinator_announcement(1).await;

        // No staleness check by design: the later write sticks
        assert_eq!(election.status().await.coordinator_rank, Some(1));
    }
}
