//! Request/response client for talking to a node.
//!
//! Used by the replicator, startup sync and the console. Every call is bounded
//! by the [`RpcTimeouts`] the client was built with.
//!
//! A call that fails mid-exchange (deadline, I/O error, early close) leaves
//! the stream in an unknown position, so the connection is dropped and the
//! next call dials a fresh one. A late reply can never answer a later request.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time::timeout,
};

use crate::config::RpcTimeouts;
use crate::message::{Request, Response, read_message, write_message};

pub struct NodeClient {
    addr: String,
    conn: Option<Connection>,
    timeouts: RpcTimeouts,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(addr: &str, deadline: Duration) -> Result<Self> {
        let stream = with_deadline(deadline, TcpStream::connect(addr))
            .await
            .with_context(|| format!("failed to connect to {addr}"))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    async fn exchange(&mut self, request: &Request) -> std::io::Result<Option<Response>> {
        write_message(&mut self.writer, request).await?;
        read_message::<_, Response>(&mut self.reader).await
    }
}

impl NodeClient {
    /// Opens a connection, giving up after `timeouts.connect`.
    pub async fn connect(addr: &str, timeouts: RpcTimeouts) -> Result<Self> {
        let conn = Connection::open(addr, timeouts.connect).await?;
        Ok(Self {
            addr: addr.to_string(),
            conn: Some(conn),
            timeouts,
        })
    }

    pub async fn put(&mut self, key: String, value: String, is_replica: bool) -> Result<String> {
        match self
            .call(Request::Put {
                key,
                value,
                is_replica,
            })
            .await?
        {
            Response::Put { message } => Ok(message),
            other => Err(unexpected("put", other)),
        }
    }

    /// Returns `None` when the node does not hold the key.
    pub async fn get(&mut self, key: String) -> Result<Option<String>> {
        match self.call(Request::Get { key }).await? {
            Response::Get { value, found: true } => Ok(Some(value)),
            Response::Get { found: false, .. } => Ok(None),
            other => Err(unexpected("get", other)),
        }
    }

    pub async fn delete(&mut self, key: String, is_replica: bool) -> Result<String> {
        match self.call(Request::Delete { key, is_replica }).await? {
            Response::Delete { message } => Ok(message),
            other => Err(unexpected("delete", other)),
        }
    }

    pub async fn list(&mut self) -> Result<HashMap<String, String>> {
        match self.call(Request::List).await? {
            Response::List { entries } => Ok(entries),
            other => Err(unexpected("list", other)),
        }
    }

    /// Sends one request and waits for its response within `timeouts.request`.
    ///
    /// An `error` response from the node is turned into an `Err`. Any other
    /// failure discards the connection; the next call reconnects.
    pub async fn call(&mut self, request: Request) -> Result<Response> {
        let op = request.op();
        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => Connection::open(&self.addr, self.timeouts.connect)
                .await
                .with_context(|| format!("{op} request to {} failed", self.addr))?,
        };

        let response = with_deadline(self.timeouts.request, conn.exchange(&request))
            .await
            .with_context(|| format!("{op} request to {} failed", self.addr))?
            .ok_or_else(|| anyhow!("{} closed the connection before answering {op}", self.addr))?;
        self.conn = Some(conn);

        if let Response::Error { message } = response {
            bail!("{} rejected {op}: {message}", self.addr);
        }
        Ok(response)
    }

    pub async fn close(self) -> Result<()> {
        let Some(mut conn) = self.conn else {
            return Ok(());
        };
        conn.writer
            .shutdown()
            .await
            .with_context(|| format!("failed to close connection to {}", self.addr))
    }
}

async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => bail!("deadline of {deadline:?} exceeded"),
    }
}

fn unexpected(op: &str, response: Response) -> anyhow::Error {
    anyhow!("unexpected response to {op}: {response:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn silent_peer_hits_request_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        // Accept the connection but never answer.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let timeouts = RpcTimeouts::uniform(Duration::from_millis(200));
        let mut client = NodeClient::connect(&addr, timeouts).await.expect("connect");
        let err = client.list().await.expect_err("request should time out");
        assert!(format!("{err:#}").contains("deadline"));

        server.abort();
    }

    #[tokio::test]
    async fn error_response_becomes_err() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);
            let _ = read_message::<_, Request>(&mut reader).await;
            write_message(
                &mut writer,
                &Response::Error {
                    message: "boom".into(),
                },
            )
            .await
            .expect("write");
        });

        let mut client = NodeClient::connect(&addr, RpcTimeouts::CONSOLE)
            .await
            .expect("connect");
        let err = client.get("k".into()).await.expect_err("error response");
        assert!(err.to_string().contains("boom"));

        let _ = server.await;
    }

    #[tokio::test]
    async fn late_reply_is_not_read_as_next_answer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        // Answers `get k` with `value-of-k`; the very first answer is slow.
        let server = tokio::spawn(async move {
            let mut first = true;
            loop {
                let (stream, _) = listener.accept().await.expect("accept");
                let delay = if first {
                    Duration::from_millis(300)
                } else {
                    Duration::ZERO
                };
                first = false;
                tokio::spawn(async move {
                    let (reader, mut writer) = stream.into_split();
                    let mut reader = BufReader::new(reader);
                    while let Ok(Some(Request::Get { key })) =
                        read_message::<_, Request>(&mut reader).await
                    {
                        tokio::time::sleep(delay).await;
                        let reply = Response::Get {
                            value: format!("value-of-{key}"),
                            found: true,
                        };
                        if write_message(&mut writer, &reply).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        let timeouts = RpcTimeouts::uniform(Duration::from_millis(150));
        let mut client = NodeClient::connect(&addr, timeouts).await.expect("connect");
        client.get("a".into()).await.expect_err("first reply is too slow");

        // Let the stale reply for `a` arrive before asking again.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(
            client.get("b".into()).await.expect("get b"),
            Some("value-of-b".to_string())
        );
        assert_eq!(
            client.get("c".into()).await.expect("get c"),
            Some("value-of-c".to_string())
        );

        client.close().await.expect("close");
        server.abort();
    }
}
