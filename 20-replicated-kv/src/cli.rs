use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{NodeConfig, RpcTimeouts, SyncSettings};
use crate::topology::DEFAULT_PEERS;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a store node that replicates writes to its peers.
    Node(NodeArgs),
    /// Connect to a node and issue commands interactively.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Address to bind for incoming requests.
    #[arg(long, default_value = "localhost:5051")]
    pub listen: String,

    /// Address identifying this node in --peer. Defaults to --listen.
    #[arg(long)]
    pub advertise: Option<String>,

    /// Comma-separated list of every node in the cluster, including this one.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_PEERS.map(String::from).to_vec())]
    pub peer: Vec<String>,

    /// Delay before pulling missing keys from a peer at startup.
    #[arg(long, default_value_t = 3000)]
    pub sync_delay_ms: u64,

    /// Deadline for connecting to and writing to a peer during replication.
    #[arg(long, default_value_t = 3000)]
    pub replication_timeout_ms: u64,

    /// Deadline for connecting to and listing a peer during startup sync.
    #[arg(long, default_value_t = 5000)]
    pub sync_timeout_ms: u64,
}

impl NodeArgs {
    pub fn advertise_addr(&self) -> &str {
        self.advertise.as_deref().unwrap_or(&self.listen)
    }

    pub fn to_config(&self) -> NodeConfig {
        NodeConfig {
            advertise: self.advertise_addr().to_string(),
            peers: self.peer.clone(),
            replication: RpcTimeouts::uniform(Duration::from_millis(self.replication_timeout_ms)),
            sync: SyncSettings {
                grace_period: Duration::from_millis(self.sync_delay_ms),
                timeouts: RpcTimeouts::uniform(Duration::from_millis(self.sync_timeout_ms)),
            },
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Address of the node to connect to.
    #[arg(long, default_value = "localhost:5051")]
    pub server: String,

    /// Deadline for each request.
    #[arg(long, default_value_t = 1000)]
    pub timeout_ms: u64,
}

impl ClientArgs {
    pub fn timeouts(&self) -> RpcTimeouts {
        RpcTimeouts::uniform(Duration::from_millis(self.timeout_ms))
    }
}
