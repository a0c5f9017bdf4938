use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream},
    select,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::message::{Request, Response, read_message, write_message};
use crate::replicator::Replicator;
use crate::service::NodeService;
use crate::sync::{SyncOutcome, spawn_startup_sync};
use crate::topology::PeerSet;

/// A node bound to a listener: the service plus everything needed to start
/// serving and syncing.
pub struct Server {
    listener: TcpListener,
    service: NodeService,
    peers: Arc<PeerSet>,
    config: NodeConfig,
}

impl Server {
    /// Builds a node on an already-bound listener.
    ///
    /// Fails if the configured peer set is invalid.
    pub fn new(listener: TcpListener, config: NodeConfig) -> Result<Self> {
        let peers = Arc::new(config.peer_set().context("invalid peer configuration")?);
        let replicator = Replicator::new(Arc::clone(&peers), config.replication);
        Ok(Self {
            listener,
            service: NodeService::new(replicator),
            peers,
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to this node's service, shared with the running server.
    pub fn service(&self) -> NodeService {
        self.service.clone()
    }

    /// Serves requests and runs startup sync until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (sync, serve) = self.start();
        let result = serve.run_until(shutdown).await;
        sync.abort();
        result
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }

    /// Kicks off startup sync and hands back the accept loop.
    ///
    /// The sync handle resolves with the merge outcome once the grace period
    /// has passed and a peer has been tried.
    pub fn start(self) -> (JoinHandle<SyncOutcome>, AcceptLoop) {
        let Server {
            listener,
            service,
            peers,
            config,
        } = self;

        info!(
            node = %peers.local(),
            peers = ?peers.addrs(),
            "starting node"
        );
        let sync = spawn_startup_sync(service.clone(), peers, config.sync);
        (sync, AcceptLoop { listener, service })
    }
}

pub struct AcceptLoop {
    listener: TcpListener,
    service: NodeService,
}

impl AcceptLoop {
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let AcceptLoop { listener, service } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("node shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &service);
                }
            }
        }

        Ok(())
    }
}

fn handle_accept_result(result: std::io::Result<(TcpStream, SocketAddr)>, service: &NodeService) {
    match result {
        Ok((stream, peer)) => spawn_connection_handler(stream, peer, service),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(stream: TcpStream, peer: SocketAddr, service: &NodeService) {
    let service = service.clone();
    tokio::spawn(async move {
        if let Err(err) = handle_connection(stream, service).await {
            warn!(peer = %peer, error = ?err, "connection closed with error");
        }
    });
}

/// Answers requests on one connection, in order, until the caller hangs up.
async fn handle_connection(stream: TcpStream, service: NodeService) -> Result<()> {
    let peer = stream.peer_addr().ok();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let request = match read_message::<_, Request>(&mut reader).await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(err) => {
                let reply = Response::Error {
                    message: format!("malformed request: {err}"),
                };
                // Best effort; the connection is closed either way.
                let _ = write_message(&mut writer, &reply).await;
                return Err(err).context("failed to read request");
            }
        };

        debug!(?peer, op = request.op(), "request");
        let response = service.handle(request);
        write_message(&mut writer, &response)
            .await
            .context("failed to write response")?;
    }

    debug!(?peer, "connection closed");
    Ok(())
}
