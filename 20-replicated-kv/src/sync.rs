//! One-shot catch-up merge run when a node starts.
//!
//! After a grace period the node asks its peers, in configured order, for a
//! full listing and merges the first one that answers. Only keys the node has
//! never seen are filled in. This does not reconcile divergent values or
//! deletions: a key deleted elsewhere while this node was down comes back if
//! the answering peer still has it.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::NodeClient;
use crate::config::{RpcTimeouts, SyncSettings};
use crate::service::NodeService;
use crate::topology::PeerSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Merged { peer: String, inserted: usize },
    NoPeerAvailable,
}

/// Runs [`sync_from_peers`] in the background after `settings.grace_period`.
pub fn spawn_startup_sync(
    service: NodeService,
    peers: Arc<PeerSet>,
    settings: SyncSettings,
) -> JoinHandle<SyncOutcome> {
    tokio::spawn(async move {
        tokio::time::sleep(settings.grace_period).await;
        sync_from_peers(&service, &peers, settings.timeouts).await
    })
}

/// Merges the snapshot of the first peer that answers a List; later peers are not asked.
pub async fn sync_from_peers(
    service: &NodeService,
    peers: &PeerSet,
    timeouts: RpcTimeouts,
) -> SyncOutcome {
    for peer in peers.others() {
        match sync_from_peer(service, peer, timeouts).await {
            Ok(inserted) => {
                info!(peer, inserted, "synced from peer");
                return SyncOutcome::Merged {
                    peer: peer.to_string(),
                    inserted,
                };
            }
            Err(err) => warn!(peer, error = ?err, "failed to sync from peer"),
        }
    }

    warn!("no peer available for startup sync, keeping local state");
    SyncOutcome::NoPeerAvailable
}

async fn sync_from_peer(service: &NodeService, peer: &str, timeouts: RpcTimeouts) -> Result<usize> {
    info!(peer, "syncing from peer");
    let mut client = NodeClient::connect(peer, timeouts).await?;
    let entries = client.list().await?;
    // Closing is best effort; the listing is already in hand.
    let _ = client.close().await;
    Ok(service.merge_missing(entries))
}
