//! Helpers for spinning up real nodes on localhost.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use replicated_kv::{
    client::NodeClient,
    config::{NodeConfig, RpcTimeouts, SyncSettings},
    message::{Request, Response, read_message, write_message},
    server::Server,
    service::NodeService,
    sync::SyncOutcome,
};
use tokio::{io::BufReader, net::TcpListener, sync::oneshot, task::JoinHandle};

pub const FAST: RpcTimeouts = RpcTimeouts::uniform(Duration::from_millis(500));
pub const SETTLE: Duration = Duration::from_secs(3);

/// Config with short deadlines. Startup sync fires after `sync_delay`.
pub fn test_config(addr: &str, peers: &[String], sync_delay: Duration) -> NodeConfig {
    let mut config = NodeConfig::new(addr, peers.to_vec());
    config.replication = FAST;
    config.sync = SyncSettings {
        grace_period: sync_delay,
        timeouts: FAST,
    };
    config
}

pub async fn bind_listeners(n: usize) -> Result<(Vec<TcpListener>, Vec<String>)> {
    let mut listeners = Vec::new();
    let mut addrs = Vec::new();
    for _ in 0..n {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        addrs.push(listener.local_addr()?.to_string());
        listeners.push(listener);
    }
    Ok((listeners, addrs))
}

/// An address nothing is listening on (yet).
pub fn reserve_addr() -> Result<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.to_string())
}

pub struct TestNode {
    pub addr: String,
    pub service: NodeService,
    sync: Option<JoinHandle<SyncOutcome>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestNode {
    pub fn start(listener: TcpListener, config: NodeConfig) -> Result<Self> {
        Ok(Self::from_server(Server::new(listener, config)?))
    }

    /// Starts a server that was built (and possibly preloaded) by the caller.
    pub fn from_server(server: Server) -> Self {
        let addr = server
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default();
        let service = server.service();
        let (sync, accept) = server.start();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            let _ = accept.run_until(shutdown).await;
        });

        Self {
            addr,
            service,
            sync: Some(sync),
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub async fn client(&self) -> Result<NodeClient> {
        NodeClient::connect(&self.addr, FAST).await
    }

    pub async fn sync_outcome(&mut self) -> Result<SyncOutcome> {
        match self.sync.take() {
            Some(handle) => Ok(handle.await?),
            None => bail!("sync outcome already taken"),
        }
    }

    pub async fn shutdown(mut self) {
        if let Some(sync) = self.sync.take() {
            sync.abort();
        }
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// N nodes that all know about each other.
pub struct TestCluster {
    pub nodes: Vec<TestNode>,
}

impl TestCluster {
    /// Startup sync is pushed far out so it never interferes with a test.
    pub async fn spawn(n: usize) -> Result<Self> {
        let (listeners, addrs) = bind_listeners(n).await?;
        let mut nodes = Vec::new();
        for (listener, addr) in listeners.into_iter().zip(&addrs) {
            let config = test_config(addr, &addrs, Duration::from_secs(3600));
            nodes.push(TestNode::start(listener, config)?);
        }
        Ok(Self { nodes })
    }

    pub fn node(&self, index: usize) -> &TestNode {
        &self.nodes[index]
    }

    pub fn addrs(&self) -> Vec<String> {
        self.nodes.iter().map(|node| node.addr.clone()).collect()
    }

    pub async fn shutdown(self) {
        for node in self.nodes {
            node.shutdown().await;
        }
    }
}

/// Polls `check` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    loop {
        if check() {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// A fake peer that records every request and acknowledges it.
pub struct StubPeer {
    pub addr: String,
    requests: Arc<Mutex<Vec<Request>>>,
    task: JoinHandle<()>,
}

impl StubPeer {
    pub async fn spawn() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let (reader, mut writer) = stream.into_split();
                    let mut reader = BufReader::new(reader);
                    while let Ok(Some(request)) = read_message::<_, Request>(&mut reader).await {
                        let response = acknowledge(&request);
                        recorded.lock().unwrap().push(request);
                        if write_message(&mut writer, &response).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Ok(Self {
            addr,
            requests,
            task,
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Drop for StubPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn acknowledge(request: &Request) -> Response {
    match request {
        Request::Put { .. } => Response::Put {
            message: "OK".into(),
        },
        Request::Get { .. } => Response::Get {
            value: String::new(),
            found: false,
        },
        Request::Delete { .. } => Response::Delete {
            message: "Deleted".into(),
        },
        Request::List => Response::List {
            entries: Default::default(),
        },
    }
}
