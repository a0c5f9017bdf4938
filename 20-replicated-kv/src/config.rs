//! Runtime configuration for a node.
//!
//! The CLI in [`crate::cli`] is converted into these plain values so the
//! server and tests can build nodes without going through argument parsing.

use std::time::Duration;

use anyhow::Result;

use crate::topology::PeerSet;

/// Deadlines for one outbound call: establishing the connection, then the
/// request/response exchange. Expiry aborts only that call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl RpcTimeouts {
    pub const fn uniform(timeout: Duration) -> Self {
        Self {
            connect: timeout,
            request: timeout,
        }
    }

    /// Replication fan-out to a single peer.
    pub const REPLICATION: Self = Self::uniform(Duration::from_secs(3));
    /// Startup sync's List call.
    pub const SYNC: Self = Self::uniform(Duration::from_secs(5));
    /// Interactive console requests.
    pub const CONSOLE: Self = Self::uniform(Duration::from_secs(1));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// How long to wait after startup before asking peers, so they have time to come up.
    pub grace_period: Duration,
    pub timeouts: RpcTimeouts,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(3),
            timeouts: RpcTimeouts::SYNC,
        }
    }
}

/// Everything needed to run one node on an already-bound listener.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This node's address as it appears in `peers`.
    pub advertise: String,
    /// All cluster members, including self, in sync order.
    pub peers: Vec<String>,
    pub replication: RpcTimeouts,
    pub sync: SyncSettings,
}

impl NodeConfig {
    pub fn new(advertise: impl Into<String>, peers: Vec<String>) -> Self {
        Self {
            advertise: advertise.into(),
            peers,
            replication: RpcTimeouts::REPLICATION,
            sync: SyncSettings::default(),
        }
    }

    pub fn peer_set(&self) -> Result<PeerSet> {
        PeerSet::new(self.peers.clone(), self.advertise.clone())
    }
}
