//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Open an HTTP/1.1 connection to the cluster endpoint
//! - Generate unique connection IDs for tracing
//! - Send one request at a time and read the full response
//! - Tear down the background connection driver on close

use hyper::body::{Bytes, Incoming};
use hyper::client::conn::http1;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::{AbortHandle, JoinHandle};

use crate::config::{ConnectionOptions, Endpoint};

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough since only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for pool bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// In the pool, reusable.
    Idle,
    /// Owned by exactly one in-flight request.
    CheckedOut,
    /// Removed from the pool.
    Closed,
}

/// Failures of the underlying connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("HTTP protocol error: {0}")]
    Protocol(#[from] hyper::Error),

    #[error("no response within {0:?}")]
    ReceiveTimeout(Duration),
}

/// Raw response read off the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// A live HTTP/1.1 connection to one endpoint.
pub struct Connection {
    id: ConnectionId,
    sender: http1::SendRequest<Full<Bytes>>,
    driver: JoinHandle<()>,
    state: ConnectionState,
    last_used: Instant,
}

impl Connection {
    /// Open a TCP connection and perform the HTTP/1.1 handshake.
    pub async fn connect(endpoint: &Endpoint, opts: &ConnectionOptions) -> Result<Self, TransportError> {
        let addr = endpoint.authority();
        let timeout = opts.connect_timeout();

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr.as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Err(_) => return Err(TransportError::ConnectTimeout { addr, timeout }),
        };
        if opts.nodelay {
            stream
                .set_nodelay(true)
                .map_err(|source| TransportError::Connect { addr: addr.clone(), source })?;
        }

        let (sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
        let id = ConnectionId::new();
        let driver = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(connection_id = %id, error = %e, "Connection driver exited with error");
            }
        });

        tracing::debug!(connection_id = %id, addr = %addr, "Connection established");
        Ok(Self {
            id,
            sender,
            driver,
            state: ConnectionState::Idle,
            last_used: Instant::now(),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// Time since the last completed request.
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// False once the peer closed the connection or the driver stopped.
    pub fn is_usable(&self) -> bool {
        self.state != ConnectionState::Closed && !self.sender.is_closed() && !self.driver.is_finished()
    }

    /// Send `request` and read the whole response within `timeout`.
    pub async fn send(
        &mut self,
        request: hyper::Request<Full<Bytes>>,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let exchange = async {
            self.sender.ready().await?;
            let response: hyper::Response<Incoming> = self.sender.send_request(request).await?;
            let (parts, body) = response.into_parts();
            let body = body.collect().await?.to_bytes();
            let headers = parts
                .headers
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
                .collect();
            Ok::<_, TransportError>(RawResponse {
                status: parts.status.as_u16(),
                headers,
                body,
            })
        };

        let response = match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::ReceiveTimeout(timeout)),
        };
        self.last_used = Instant::now();
        Ok(response)
    }

    /// Handle that tears the connection down from outside.
    pub fn abort_handle(&self) -> AbortHandle {
        self.driver.abort_handle()
    }

    /// Stop the connection driver, closing the socket.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.driver.abort();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.driver.abort();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("idle_for", &self.idle_for())
            .finish()
    }
}
