//! Mutual Exclusion
//!
//! Token-ring mutual exclusion: a single token circulates in rank order,
//! `rank -> (rank + 1) mod N`, and possession of the token is the lock.
//! Rank 0 starts holding the token.
//!
//! A failed transfer restores the sender's token, so the token is never
//! lost, only delayed. The ring never skips a dead successor: a successor
//! that stays down stalls rotation until it returns.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::identity::NodeIdentity;
use crate::network::PeerTransport;
use crate::protocol::Message;

/// Caller-supplied critical-section body, invoked with the entry number
/// while the node holds the token
pub type CriticalSectionFn =
    Arc<dyn Fn(u64) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Mutex timing configuration
#[derive(Debug, Clone)]
pub struct MutexTiming {
    /// Timeout on a token transfer to the successor
    pub transfer_timeout: Duration,
    /// Hold time of the default simulated critical section
    pub hold_time: Duration,
}

impl Default for MutexTiming {
    fn default() -> Self {
        Self {
            transfer_timeout: Duration::from_millis(5000),
            hold_time: Duration::from_millis(2000),
        }
    }
}

/// Read-only mutex status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct MutexStatus {
    pub rank: u32,
    pub has_token: bool,
    pub in_critical_section: bool,
    pub wants_access: bool,
    pub entries: u64,
}

/// Token-ring mutex: owns this node's belief about token possession,
/// critical-section occupancy, and the pending access request
pub struct TokenRingMutex {
    /// This node's identity
    identity: Arc<NodeIdentity>,
    /// Transport to peers
    transport: Arc<dyn PeerTransport>,
    /// Timing configuration
    timing: MutexTiming,
    /// Critical-section body
    critical_section: CriticalSectionFn,
    /// Token possession flag
    has_token: RwLock<bool>,
    /// Critical-section occupancy flag
    in_critical_section: RwLock<bool>,
    /// Pending local access request
    wants_access: RwLock<bool>,
    /// Completed critical-section entries
    entries: RwLock<u64>,
}

impl TokenRingMutex {
    /// Create a mutex whose critical section is a simulated hold of
    /// `timing.hold_time`
    pub fn new(
        identity: Arc<NodeIdentity>,
        transport: Arc<dyn PeerTransport>,
        timing: MutexTiming,
    ) -> Self {
        let hold = timing.hold_time;
        let body: CriticalSectionFn = Arc::new(move |_entry| {
            let fut: Pin<Box<dyn Future<Output = ()> + Send>> =
                Box::pin(tokio::time::sleep(hold));
            fut
        });
        Self::with_critical_section(identity, transport, timing, body)
    }

    /// Create a mutex with a caller-supplied critical-section body
    pub fn with_critical_section(
        identity: Arc<NodeIdentity>,
        transport: Arc<dyn PeerTransport>,
        timing: MutexTiming,
        critical_section: CriticalSectionFn,
    ) -> Self {
        // Rank 0 starts with the token, by convention
        let has_token = identity.rank() == 0;

        Self {
            identity,
            transport,
            timing,
            critical_section,
            has_token: RwLock::new(has_token),
            in_critical_section: RwLock::new(false),
            wants_access: RwLock::new(false),
            entries: RwLock::new(0),
        }
    }

    /// Ask for the critical section.
    ///
    /// With the token in hand the section runs immediately. Otherwise the
    /// request is purely passive: the node waits for the token to come
    /// around the ring, so latency is ring position, not urgency.
    pub async fn request_access(&self) {
        *self.wants_access.write().await = true;
        tracing::info!(rank = self.identity.rank(), "requesting critical section");

        if *self.has_token.read().await {
            self.enter_critical_section().await;
        } else {
            tracing::info!(rank = self.identity.rank(), "waiting for token");
        }
    }

    /// Run the critical section. Requires the token; exiting forwards it.
    async fn enter_critical_section(&self) {
        if !*self.has_token.read().await {
            return;
        }

        *self.in_critical_section.write().await = true;
        let entry = {
            let mut entries = self.entries.write().await;
            *entries += 1;
            *entries
        };

        tracing::info!(rank = self.identity.rank(), entry, "entered critical section");
        (self.critical_section)(entry).await;
        tracing::info!(rank = self.identity.rank(), entry, "left critical section");

        *self.in_critical_section.write().await = false;
        *self.wants_access.write().await = false;

        self.pass_token().await;
    }

    /// Hand the token to the ring successor.
    ///
    /// The local flag is cleared before the transfer (optimistic release)
    /// and restored if the send fails, so a dead successor delays the token
    /// instead of destroying it. One transfer is in flight at a time.
    pub async fn pass_token(&self) {
        {
            let mut has_token = self.has_token.write().await;
            if !*has_token {
                return;
            }
            *has_token = false;
        }

        let successor = self.identity.successor();
        let transfer = Message::TokenTransfer {
            from_rank: self.identity.rank(),
        };

        tracing::info!(rank = self.identity.rank(), successor, "passing token");

        match self
            .transport
            .send(successor, transfer, self.timing.transfer_timeout)
            .await
        {
            Ok(Message::Ack) => {}
            Ok(other) => {
                tracing::warn!(
                    rank = self.identity.rank(),
                    successor,
                    reply = other.type_name(),
                    "unexpected reply to token transfer, reclaiming token"
                );
                *self.has_token.write().await = true;
            }
            Err(e) => {
                tracing::warn!(
                    rank = self.identity.rank(),
                    successor,
                    "token transfer failed, reclaiming token: {}",
                    e
                );
                *self.has_token.write().await = true;
            }
        }
    }

    /// Accept the token from `from_rank`.
    ///
    /// A pending request enters the critical section; otherwise the token
    /// is forwarded immediately so it never rests at a node that does not
    /// need it. Either way the work runs on a detached task, so the
    /// transfer acknowledgement is not held up by the critical section.
    pub async fn receive_token(self: Arc<Self>, from_rank: u32) {
        tracing::info!(rank = self.identity.rank(), from_rank, "token received");

        *self.has_token.write().await = true;

        let wants = *self.wants_access.read().await;
        let in_critical_section = *self.in_critical_section.read().await;

        let mutex = Arc::clone(&self);
        if wants && !in_critical_section {
            tokio::spawn(async move {
                mutex.enter_critical_section().await;
            });
        } else {
            tracing::debug!(rank = self.identity.rank(), "token not needed, forwarding");
            tokio::spawn(async move {
                mutex.pass_token().await;
            });
        }
    }

    /// Early release.
    ///
    /// Inside the critical section this ends it and forwards the token;
    /// holding the token unused forwards it; anything else is a no-op.
    pub async fn release_access(&self) {
        if *self.in_critical_section.read().await {
            tracing::info!(rank = self.identity.rank(), "releasing critical section");
            *self.in_critical_section.write().await = false;
            *self.wants_access.write().await = false;
            self.pass_token().await;
        } else if *self.has_token.read().await && !*self.wants_access.read().await {
            self.pass_token().await;
        }
    }

    /// Read-only status snapshot
    pub async fn status(&self) -> MutexStatus {
        MutexStatus {
            rank: self.identity.rank(),
            has_token: *self.has_token.read().await,
            in_critical_section: *self.in_critical_section.read().await,
            wants_access: *self.wants_access.read().await,
            entries: *self.entries.read().await,
        }
    }
}
