//! Best-effort fan-out of local writes to the rest of the cluster.
//!
//! Each peer gets its own detached task that opens a fresh connection, sends
//! the mutation tagged as a replica, and closes. Nothing is retried: a peer
//! that is down when the write happens misses it.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::NodeClient;
use crate::command::Mutation;
use crate::config::RpcTimeouts;
use crate::topology::PeerSet;

#[derive(Debug, Clone)]
pub struct Replicator {
    peers: Arc<PeerSet>,
    timeouts: RpcTimeouts,
}

impl Replicator {
    pub fn new(peers: Arc<PeerSet>, timeouts: RpcTimeouts) -> Self {
        Self { peers, timeouts }
    }

    /// Sends `mutation` to every peer except self, one task per peer.
    ///
    /// Returns immediately. The handles are only useful to observe completion;
    /// dropping them leaves the tasks running.
    pub fn broadcast(&self, mutation: Mutation) -> Vec<JoinHandle<()>> {
        self.peers
            .others()
            .map(|peer| {
                let peer = peer.to_string();
                let mutation = mutation.clone();
                let timeouts = self.timeouts;
                tokio::spawn(async move {
                    replicate_to(peer, mutation, timeouts).await;
                })
            })
            .collect()
    }
}

async fn replicate_to(peer: String, mutation: Mutation, timeouts: RpcTimeouts) {
    info!(peer = %peer, ?mutation, "replicating");
    match deliver(&peer, mutation, timeouts).await {
        Ok(()) => debug!(peer = %peer, "replica delivered"),
        Err(err) => warn!(peer = %peer, error = ?err, "replication failed, dropping"),
    }
}

async fn deliver(peer: &str, mutation: Mutation, timeouts: RpcTimeouts) -> Result<()> {
    let mut client = NodeClient::connect(peer, timeouts).await?;
    client.call(mutation.into_request(true)).await?;
    client.close().await
}
