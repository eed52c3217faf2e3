//! Checked-out connection guard.
//!
//! # Responsibilities
//! - Own a connection and its pool slot for one request
//! - Hand the connection back on `release`, drop it on `invalidate`
//! - Invalidate on drop when the request never finished (cancelled or panicked)

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;

use crate::net::Connection;
use crate::pool::manager::ConnectionPool;

/// A RAII guard that holds one pool slot.
///
/// The permit is released only after the connection has been returned or closed,
/// so the pool never sees more than `pool_size` live checkouts.
pub struct PooledConnection {
    pool: Arc<ConnectionPool>,
    conn: Option<Connection>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub(crate) fn new(pool: Arc<ConnectionPool>, conn: Connection, permit: OwnedSemaphorePermit) -> Self {
        Self {
            pool,
            conn: Some(conn),
            _permit: permit,
        }
    }

    /// Return the connection to the pool.
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.checkin(conn);
        }
    }

    /// Close the connection and free its slot for a fresh one.
    pub fn invalidate(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.discard(conn, "invalidated");
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;
    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection is present until the guard is consumed")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection is present until the guard is consumed")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Mid-request state is unknown, never reuse it.
            tracing::debug!(connection_id = %conn.id(), "Connection dropped while checked out, invalidating");
            self.pool.discard(conn, "abandoned");
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").field("conn", &self.conn).finish()
    }
}
