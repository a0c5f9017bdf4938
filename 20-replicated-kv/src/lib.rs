//! Multi-node in-memory key-value store with best-effort replication.
//!
//! Every node keeps its own map and answers Put/Get/Delete/List. Writes made
//! by a client are pushed to every other node in a fixed peer list without
//! waiting for them; writes that arrive from a peer are applied and not
//! forwarded again. A node that starts late pulls the keys it is missing from
//! the first peer that answers.
//!
//! There is no leader, no quorum and no persistence. Concurrent writes to the
//! same key on different nodes can leave the nodes disagreeing; whichever
//! write a node applies last wins on that node.
//!
//! # Modules
//!
//! - [`store`]: mutex-guarded in-memory map
//! - [`topology`]: the static peer set
//! - [`command`]: mutations that get replicated
//! - [`message`]: JSON line protocol and async read/write helpers
//! - [`client`]: request/response client with per-call deadlines
//! - [`replicator`]: fire-and-forget fan-out to peers
//! - [`service`]: Put/Get/Delete/List on top of the store
//! - [`sync`]: one-shot startup catch-up from a peer
//! - [`server`]: TCP listener wiring everything together
//! - [`config`] and [`cli`]: node settings and argument parsing
//! - [`console`]: interactive client

pub mod cli;
pub mod client;
pub mod command;
pub mod config;
pub mod console;
pub mod message;
pub mod replicator;
pub mod server;
pub mod service;
pub mod store;
pub mod sync;
pub mod topology;
