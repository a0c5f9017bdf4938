//! The operations a node exposes: Put, Get, Delete and List.
//!
//! `NodeService` owns the node's [`LocalStore`]. Writes are applied locally
//! first; only writes that did not come from a peer are handed to the
//! [`Replicator`]. The `is_replica` flag is what stops a write from bouncing
//! between nodes forever.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::command::Mutation;
use crate::message::{Request, Response};
use crate::replicator::Replicator;
use crate::store::LocalStore;

pub const PUT_ACK: &str = "OK";
pub const DELETE_ACK: &str = "Deleted";

/// Cheap to clone; clones share the same store.
#[derive(Debug, Clone)]
pub struct NodeService {
    store: Arc<LocalStore>,
    replicator: Replicator,
}

impl NodeService {
    pub fn new(replicator: Replicator) -> Self {
        Self {
            store: Arc::new(LocalStore::new()),
            replicator,
        }
    }

    /// Overwrites `key` and, unless this is a replica, fans the write out.
    ///
    /// Returns as soon as the local write is done.
    pub fn put(&self, key: String, value: String, is_replica: bool) -> String {
        info!(%key, %value, is_replica, "put");
        self.store.set(key.clone(), value.clone());
        if !is_replica {
            self.replicator.broadcast(Mutation::Put { key, value });
        }
        PUT_ACK.to_string()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let value = self.store.get(key);
        info!(%key, found = value.is_some(), "get");
        value
    }

    /// Removes `key` if present. A missing key is not an error.
    pub fn delete(&self, key: String, is_replica: bool) -> String {
        info!(%key, is_replica, "delete");
        self.store.remove(&key);
        if !is_replica {
            self.replicator.broadcast(Mutation::Delete { key });
        }
        DELETE_ACK.to_string()
    }

    pub fn list(&self) -> HashMap<String, String> {
        let entries = self.store.snapshot();
        info!(count = entries.len(), "list");
        entries
    }

    /// Fills in keys this node has never seen. Never replicated.
    pub fn merge_missing(&self, entries: HashMap<String, String>) -> usize {
        self.store.merge_missing(entries)
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::Put {
                key,
                value,
                is_replica,
            } => Response::Put {
                message: self.put(key, value, is_replica),
            },
            Request::Get { key } => match self.get(&key) {
                Some(value) => Response::Get { value, found: true },
                None => Response::Get {
                    value: String::new(),
                    found: false,
                },
            },
            Request::Delete { key, is_replica } => Response::Delete {
                message: self.delete(key, is_replica),
            },
            Request::List => Response::List {
                entries: self.list(),
            },
        }
    }
}
