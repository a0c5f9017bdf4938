use std::collections::HashSet;

use anyhow::{Result, ensure};

/// Addresses used when no peer list is given on the command line.
pub const DEFAULT_PEERS: [&str; 3] = ["localhost:5051", "localhost:5052", "localhost:5053"];

/// Static cluster membership, identical on every node.
///
/// The list includes this node's own address; it is only used to exclude self
/// from replication and sync targets. Order is preserved because startup sync
/// walks peers front to back.
#[derive(Debug, Clone)]
pub struct PeerSet {
    nodes: Vec<String>,
    local: String,
}

impl PeerSet {
    pub fn new(nodes: Vec<String>, local: impl Into<String>) -> Result<Self> {
        let local = local.into();
        ensure!(!nodes.is_empty(), "peer set requires at least one node");

        let mut seen = HashSet::new();
        for node in &nodes {
            ensure!(seen.insert(node.as_str()), "duplicate peer address {node}");
        }
        ensure!(
            seen.contains(local.as_str()),
            "local address {local} must appear in the peer set"
        );

        Ok(Self { nodes, local })
    }

    pub fn addrs(&self) -> &[String] {
        &self.nodes
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    /// Every peer except this node, in configured order.
    pub fn others(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes
            .iter()
            .map(String::as_str)
            .filter(move |addr| *addr != self.local)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
