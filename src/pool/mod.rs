//! Connection pooling subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher needs a connection
//!     → manager.rs acquire(): wait for a permit (FIFO, bounded by pool_size, timeout)
//!     → reuse an idle connection or open a new one (net::Connection)
//!     → guard.rs PooledConnection owns connection + permit
//!     → release() back to idle / invalidate() on transport fault / drop = invalidate
//!
//! reaper.rs (optional):
//!     periodic timer → evict connections idle past idle_timeout
//! ```
//!
//! # Design Decisions
//! - The semaphore bounds checkouts; connections are created lazily under a permit
//! - Permit is freed only after the connection is back in the pool or closed
//! - The pool is the only mutable shared state of a cluster

pub mod guard;
pub mod manager;
pub mod reaper;

pub use guard::PooledConnection;
pub use manager::{ConnectionPool, PoolStats};
pub use reaper::IdleReaper;
