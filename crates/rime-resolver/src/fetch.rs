//! Transport fetch: one query datagram to one server.

use async_trait::async_trait;
use rime_proto::Message;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::trace;

/// What came back from a single fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// A parseable reply with a matching message id.
    Reply(Message),
    /// The deadline passed with no usable reply.
    TimedOut,
    /// A network error or an unparseable datagram.
    Failed,
}

/// A way to exchange one DNS query for one response.
///
/// The engine treats [`FetchOutcome::TimedOut`] and [`FetchOutcome::Failed`]
/// identically (retry budget, unreachable marking); the distinction exists
/// for logging. `timeout` of `None` waits indefinitely.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `query` to `server` and waits for the reply.
    async fn fetch(
        &self,
        query: &Message,
        server: SocketAddr,
        timeout: Option<Duration>,
    ) -> FetchOutcome;
}

/// Plain DNS over UDP from an ephemeral local port.
///
/// A random message id is assigned per fetch; datagrams with a different id
/// are dropped and the wait continues, so an off-path guess does not
/// terminate the fetch.
#[derive(Debug, Default)]
pub struct UdpTransport;

impl UdpTransport {
    async fn exchange(&self, query: &Message, server: SocketAddr) -> io::Result<Message> {
        let local: SocketAddr = if server.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(server).await?;

        let mut query = query.clone();
        query.set_id(rand::random());
        let wire = query.to_wire();
        socket.send(&wire).await?;

        let mut buf = vec![0u8; 65_535];
        loop {
            let len = socket.recv(&mut buf).await?;
            let reply = Message::parse(&buf[..len]).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, e.to_string())
            })?;
            if reply.id() == query.id() {
                return Ok(reply);
            }
            trace!(got = reply.id(), want = query.id(), "dropping mismatched reply id");
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn fetch(
        &self,
        query: &Message,
        server: SocketAddr,
        timeout: Option<Duration>,
    ) -> FetchOutcome {
        let exchange = self.exchange(query, server);
        let result = match timeout {
            Some(deadline) => match tokio::time::timeout(deadline, exchange).await {
                Ok(done) => done,
                Err(_) => return FetchOutcome::TimedOut,
            },
            None => exchange.await,
        };

        match result {
            Ok(reply) => FetchOutcome::Reply(reply),
            Err(err) => {
                trace!(%server, %err, "fetch failed");
                FetchOutcome::Failed
            }
        }
    }
}
