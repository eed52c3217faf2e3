//! Bounded connection pool for one cluster.
//!
//! # Responsibilities
//! - Hand out at most `pool_size` connections at a time
//! - Create connections lazily, reuse idle ones
//! - Reclaim released connections, drop invalidated ones
//! - Reject acquisitions once closed
//!
//! # Design Decisions
//! - A checkout is counted from the moment its permit is held, including while the
//!   connection is still being opened, so `drain` never misses a connect in progress
//! - New connections are admitted under the live-map lock; one that finishes opening
//!   after `close` is retired instead of handed out

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::AbortHandle;

use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::net::{Connection, ConnectionId, ConnectionState};
use crate::observability::metrics;
use crate::pool::guard::PooledConnection;

/// Point-in-time view of pool bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Configured maximum of checked-out connections.
    pub size: usize,
    /// Connections waiting in the pool.
    pub idle: usize,
    /// Connections owned by in-flight requests.
    pub checked_out: usize,
    /// Live connections (idle + checked out).
    pub open: usize,
    /// Connections created since the pool started.
    pub created: u64,
    /// Connections closed since the pool started.
    pub closed: u64,
}

/// Bounded set of persistent connections to one endpoint.
///
/// Waiters are served in FIFO order by the underlying semaphore, so no caller
/// starves while others keep releasing connections.
pub struct ConnectionPool {
    config: Arc<ClusterConfig>,
    /// One permit per connection that may be checked out.
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<Connection>>,
    /// Abort handles of every live connection driver.
    live: Mutex<HashMap<ConnectionId, AbortHandle>>,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
    /// Checkouts in progress or held, counted from permit acquisition.
    checked_out: AtomicUsize,
    /// Woken when `checked_out` drops to zero.
    all_returned: Notify,
    created: AtomicU64,
    closed_count: AtomicU64,
}

impl ConnectionPool {
    /// Create an empty pool. No connection is opened until the first acquire.
    pub fn new(config: Arc<ClusterConfig>) -> Arc<Self> {
        let (closed_tx, _) = watch::channel(false);
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(config.pool_size)),
            idle: Mutex::new(VecDeque::new()),
            live: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            closed_tx,
            checked_out: AtomicUsize::new(0),
            all_returned: Notify::new(),
            created: AtomicU64::new(0),
            closed_count: AtomicU64::new(0),
            config,
        })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Receiver that flips to `true` when the pool closes.
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    /// Check out a connection, waiting up to `timeout` for one to free up.
    pub async fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<PooledConnection> {
        if self.is_closed() {
            return Err(Error::NotStarted(self.config.name.clone()));
        }

        let prefix = &self.config.telemetry_prefix;
        let started = Instant::now();
        let permit = match tokio::time::timeout(timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(Error::NotStarted(self.config.name.clone())),
            Err(_) => {
                tracing::warn!(cluster = %self.config.name, timeout = ?timeout, "Timed out waiting for a pooled connection");
                metrics::record_pool_timeout(prefix);
                return Err(Error::PoolTimeout(timeout));
            }
        };
        metrics::record_pool_wait(prefix, started.elapsed());

        // Dropping the reservation or the permit on any early return frees the slot.
        let checkout = self.reserve()?;
        let mut conn = match self.take_idle() {
            Some(conn) => conn,
            None => self.open_connection().await?,
        };
        conn.set_state(ConnectionState::CheckedOut);
        checkout.keep();
        tracing::trace!(cluster = %self.config.name, connection_id = %conn.id(), "Connection checked out");
        self.record_gauges();

        Ok(PooledConnection::new(self.clone(), conn, permit))
    }

    /// Return a healthy connection to the pool.
    pub fn release(&self, conn: PooledConnection) {
        conn.release();
    }

    /// Drop a faulted connection so a fresh one can take its slot.
    pub fn invalidate(&self, conn: PooledConnection) {
        conn.invalidate();
    }

    /// Stop handing out connections and close the idle ones.
    ///
    /// Checked-out connections are closed as they come back.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();
        let _ = self.closed_tx.send(true);

        let idle: Vec<Connection> = self.lock_idle().drain(..).collect();
        for conn in idle {
            self.retire(conn, "pool closed");
        }
        tracing::info!(cluster = %self.config.name, checked_out = self.checked_out.load(Ordering::SeqCst), "Connection pool closed");
        self.record_gauges();
    }

    /// Wait until no connection is checked out, or `grace` elapses.
    ///
    /// Returns `true` if the pool drained in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let returned = self.all_returned.notified();
            tokio::pin!(returned);
            // Register before checking so a wakeup between the two is not lost.
            returned.as_mut().enable();
            if self.checked_out.load(Ordering::SeqCst) == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, returned).await.is_err() {
                return self.checked_out.load(Ordering::SeqCst) == 0;
            }
        }
    }

    /// Abort every live connection driver, including checked-out ones.
    pub fn abort_all(&self) {
        let handles: Vec<(ConnectionId, AbortHandle)> = self.lock_live().drain().collect();
        for (id, handle) in handles {
            tracing::debug!(cluster = %self.config.name, connection_id = %id, "Aborting connection");
            handle.abort();
        }
    }

    /// Close idle connections unused for longer than `max_idle`. Returns how many were closed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<Connection> = {
            let mut idle = self.lock_idle();
            let (expired, keep): (VecDeque<_>, VecDeque<_>) = idle
                .drain(..)
                .partition(|conn| conn.idle_for() >= max_idle || !conn.is_usable());
            *idle = keep;
            expired.into_iter().collect()
        };

        let count = expired.len();
        for conn in expired {
            self.retire(conn, "idle timeout");
        }
        if count > 0 {
            self.record_gauges();
        }
        count
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.config.pool_size,
            idle: self.lock_idle().len(),
            checked_out: self.checked_out.load(Ordering::SeqCst),
            open: self.lock_live().len(),
            created: self.created.load(Ordering::Relaxed),
            closed: self.closed_count.load(Ordering::Relaxed),
        }
    }

    /// Called by the guard when a request hands its connection back.
    pub(crate) fn checkin(&self, mut conn: Connection) {
        if self.is_closed() {
            self.retire(conn, "pool closed");
        } else if !conn.is_usable() {
            self.retire(conn, "peer closed");
        } else {
            conn.set_state(ConnectionState::Idle);
            tracing::trace!(cluster = %self.config.name, connection_id = %conn.id(), "Connection released");
            self.lock_idle().push_back(conn);
        }
        self.end_checkout();
        self.record_gauges();
    }

    /// Called by the guard when a checked-out connection faulted or was abandoned.
    pub(crate) fn discard(&self, conn: Connection, reason: &'static str) {
        self.retire(conn, reason);
        self.end_checkout();
        self.record_gauges();
    }

    /// Count a checkout for a caller holding a permit, unless the pool closed meanwhile.
    fn reserve(&self) -> Result<Reservation<'_>> {
        self.checked_out.fetch_add(1, Ordering::SeqCst);
        let reservation = Reservation { pool: self, kept: false };
        // Either close() saw the increment above, or this sees the closed flag.
        if self.is_closed() {
            return Err(Error::NotStarted(self.config.name.clone()));
        }
        Ok(reservation)
    }

    fn end_checkout(&self) {
        if self.checked_out.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.all_returned.notify_waiters();
        }
    }

    /// Most recently used usable idle connection; stale ones are closed on the way.
    fn take_idle(&self) -> Option<Connection> {
        let mut stale = Vec::new();
        let found = {
            let mut idle = self.lock_idle();
            let mut found = None;
            while let Some(conn) = idle.pop_back() {
                if conn.is_usable() {
                    found = Some(conn);
                    break;
                }
                stale.push(conn);
            }
            found
        };
        for conn in stale {
            self.retire(conn, "peer closed");
        }
        found
    }

    async fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::connect(&self.config.endpoint, &self.config.conn_opts)
            .await
            .map_err(|e| {
                tracing::warn!(cluster = %self.config.name, error = %e, "Failed to open connection");
                Error::Transport(e)
            })?;
        self.created.fetch_add(1, Ordering::Relaxed);
        metrics::record_connection_opened(&self.config.telemetry_prefix);
        self.admit(conn)
    }

    /// Track a freshly opened connection, or retire it if the pool closed while it opened.
    fn admit(&self, conn: Connection) -> Result<Connection> {
        {
            // abort_all takes this lock after close() sets the flag, so a connection
            // admitted here is always reached by it.
            let mut live = self.lock_live();
            if !self.is_closed() {
                live.insert(conn.id(), conn.abort_handle());
                return Ok(conn);
            }
        }
        self.retire(conn, "pool closed");
        Err(Error::NotStarted(self.config.name.clone()))
    }

    fn retire(&self, mut conn: Connection, reason: &'static str) {
        conn.close();
        self.lock_live().remove(&conn.id());
        self.closed_count.fetch_add(1, Ordering::Relaxed);
        metrics::record_connection_closed(&self.config.telemetry_prefix, reason);
        tracing::debug!(cluster = %self.config.name, connection_id = %conn.id(), reason, "Connection removed from pool");
    }

    fn record_gauges(&self) {
        let stats = self.stats();
        metrics::record_pool_connections(&self.config.telemetry_prefix, stats.idle, stats.checked_out);
    }

    // A panic elsewhere never leaves these collections half-updated, so poisoning is ignored.
    fn lock_idle(&self) -> MutexGuard<'_, VecDeque<Connection>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_live(&self) -> MutexGuard<'_, HashMap<ConnectionId, AbortHandle>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A counted checkout that is undone on drop unless kept.
struct Reservation<'a> {
    pool: &'a ConnectionPool,
    kept: bool,
}

impl Reservation<'_> {
    /// Hand the count over to the [`PooledConnection`] about to be built.
    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.kept {
            self.pool.end_checkout();
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("cluster", &self.config.name)
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}
