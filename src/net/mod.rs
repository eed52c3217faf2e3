//! Network layer.
//!
//! # Data Flow
//! ```text
//! pool needs a connection
//!     → connection.rs (TCP connect with timeout, HTTP/1.1 handshake)
//!     → background driver task owns the socket
//!     → send(): one request/response exchange at a time
//!     → close()/drop aborts the driver
//! ```
//!
//! # Design Decisions
//! - One connection serves one request at a time (HTTP/1.1, no pipelining)
//! - The full response body is read before the connection is handed back
//! - Any transport failure leaves the connection unusable

pub mod connection;

pub use connection::{Connection, ConnectionId, ConnectionState, RawResponse, TransportError};
