//! Node Identity
//!
//! The immutable per-process identity: this node's rank, the cluster size,
//! and the peer address table. Both protocols derive their target sets from
//! the rank arithmetic here.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Immutable identity of one process in the cluster.
///
/// Created once at startup and shared by reference; never mutated. The peer
/// table is indexed by rank and includes this node's own entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    rank: u32,
    cluster_size: u32,
    peers: Vec<String>,
}

impl NodeIdentity {
    /// Create a new identity, validating the rank and peer table.
    pub fn new(rank: u32, cluster_size: u32, peers: Vec<String>) -> Result<Self> {
        if cluster_size == 0 {
            return Err(Error::Config("cluster size must be at least 1".into()));
        }
        if rank >= cluster_size {
            return Err(Error::Config(format!(
                "rank {} is out of range for a cluster of {}",
                rank, cluster_size
            )));
        }
        if peers.len() != cluster_size as usize {
            return Err(Error::Config(format!(
                "peer table has {} entries, expected {}",
                peers.len(),
                cluster_size
            )));
        }

        Ok(Self {
            rank,
            cluster_size,
            peers,
        })
    }

    /// This node's rank
    pub fn rank(&self) -> u32 {
        self.rank
    }

    /// Total number of processes in the cluster
    pub fn cluster_size(&self) -> u32 {
        self.cluster_size
    }

    /// Ranks strictly greater than this node's, bounded by the cluster size.
    /// Empty exactly when this node holds the highest rank.
    pub fn higher_ranks(&self) -> Vec<u32> {
        (self.rank + 1..self.cluster_size).collect()
    }

    /// Every rank in the cluster except this node's
    pub fn peer_ranks(&self) -> Vec<u32> {
        (0..self.cluster_size).filter(|r| *r != self.rank).collect()
    }

    /// The ring successor: (rank + 1) mod cluster_size
    pub fn successor(&self) -> u32 {
        (self.rank + 1) % self.cluster_size
    }

    /// Check whether this node holds the highest rank
    pub fn is_highest(&self) -> bool {
        self.rank == self.cluster_size - 1
    }

    /// Look up a peer address by rank
    pub fn peer_address(&self, rank: u32) -> Result<&str> {
        self.peers
            .get(rank as usize)
            .map(|s| s.as_str())
            .ok_or(Error::UnknownRank(rank))
    }

    /// This node's own address from the peer table
    pub fn own_address(&self) -> &str {
        &self.peers[self.rank as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(rank: u32) -> NodeIdentity {
        NodeIdentity::new(
            rank,
            3,
            vec![
                "127.0.0.1:7600".into(),
                "127.0.0.1:7601".into(),
                "127.0.0.1:7602".into(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_higher_ranks() {
        assert_eq!(identity(0).higher_ranks(), vec![1, 2]);
        assert_eq!(identity(1).higher_ranks(), vec![2]);
        assert!(identity(2).higher_ranks().is_empty());
        assert!(identity(2).is_highest());
    }

    #[test]
    fn test_ring_successor_wraps() {
        assert_eq!(identity(0).successor(), 1);
        assert_eq!(identity(2).successor(), 0);
    }

    #[test]
    fn test_peer_ranks_excludes_self() {
        assert_eq!(identity(1).peer_ranks(), vec![0, 2]);
    }

    #[test]
    fn test_peer_address_lookup() {
        let id = identity(0);
        assert_eq!(id.peer_address(2).unwrap(), "127.0.0.1:7602");
        assert!(matches!(id.peer_address(5), Err(Error::UnknownRank(5))));
        assert_eq!(id.own_address(), "127.0.0.1:7600");
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(NodeIdentity::new(3, 3, vec!["a".into(), "b".into(), "c".into()]).is_err());
        assert!(NodeIdentity::new(0, 3, vec!["a".into()]).is_err());
        assert!(NodeIdentity::new(0, 0, vec![]).is_err());
    }
}
