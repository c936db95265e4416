//! Multicast Placeholder
//!
//! Stand-in for the cluster's message-delivery service: a Lamport-style
//! logical clock plus an unordered in-memory log. Nothing here orders,
//! acknowledges, or delivers anything; the coordination protocols do not
//! depend on it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// One logged message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Message id, `msg-{rank}-{timestamp}`
    pub id: String,
    /// Originating rank
    pub origin: u32,
    /// Logical timestamp at the origin
    pub timestamp: u64,
    /// Payload
    pub content: String,
}

/// Read-only multicast status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct MulticastStatus {
    pub rank: u32,
    pub logical_clock: u64,
    pub log_size: usize,
}

/// Local logical clock and unordered message log
pub struct MulticastLog {
    rank: u32,
    logical_clock: RwLock<u64>,
    log: RwLock<Vec<LogRecord>>,
}

impl MulticastLog {
    /// Create a log whose clock starts at a random value in 0..=10, so
    /// clock interleavings are visible even on a single host
    pub fn new(rank: u32) -> Self {
        let clock = rand::thread_rng().gen_range(0..=10);
        tracing::debug!(rank, clock, "multicast clock initialized");
        Self::with_clock(rank, clock)
    }

    /// Create a log with a fixed initial clock
    pub fn with_clock(rank: u32, clock: u64) -> Self {
        Self {
            rank,
            logical_clock: RwLock::new(clock),
            log: RwLock::new(Vec::new()),
        }
    }

    /// Tick the clock and append a record
    pub async fn record(&self, content: String) -> LogRecord {
        let timestamp = {
            let mut clock = self.logical_clock.write().await;
            *clock += 1;
            *clock
        };

        let record = LogRecord {
            id: format!("msg-{}-{}", self.rank, timestamp),
            origin: self.rank,
            timestamp,
            content,
        };

        tracing::info!(rank = self.rank, id = %record.id, "message logged");
        self.log.write().await.push(record.clone());
        record
    }

    /// Merge a remote timestamp into the clock:
    /// `clock = max(clock, timestamp) + 1`
    pub async fn observe(&self, timestamp: u64) -> u64 {
        let mut clock = self.logical_clock.write().await;
        *clock = (*clock).max(timestamp) + 1;
        *clock
    }

    /// Snapshot of the log
    pub async fn records(&self) -> Vec<LogRecord> {
        self.log.read().await.clone()
    }

    /// Read-only status snapshot
    pub async fn status(&self) -> MulticastStatus {
        MulticastStatus {
            rank: self.rank,
            logical_clock: *self.logical_clock.read().await,
            log_size: self.log.read().await.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_ticks_and_appends() {
        let log = MulticastLog::with_clock(1, 0);

        let first = log.record("hello".into()).await;
        let second = log.record("world".into()).await;

        assert_eq!(first.id, "msg-1-1");
        assert_eq!(second.timestamp, 2);

        let status = log.status().await;
        assert_eq!(status.logical_clock, 2);
        assert_eq!(status.log_size, 2);
    }

    #[tokio::test]
    async fn test_observe_merges_ahead_clock() {
        let log = MulticastLog::with_clock(0, 3);

        assert_eq!(log.observe(10).await, 11);
        // A timestamp behind the clock still advances it by one
        assert_eq!(log.observe(2).await, 12);
    }

    #[tokio::test]
    async fn test_initial_clock_in_range() {
        let log = MulticastLog::new(0);
        assert!(log.status().await.logical_clock <= 10);
    }
}
