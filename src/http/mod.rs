//! HTTP request subsystem.
//!
//! # Data Flow
//! ```text
//! Caller (method, path, body, params, headers)
//!     → request.rs (query string, JSON body, content-type)
//!     → auth signer (headers added)
//!     → dispatcher.rs (acquire pooled connection, send, time phases)
//!     → response.rs (decode JSON, map status to Response or Error)
//!     → telemetry event (exactly one per request)
//!     → Caller
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;

pub use dispatcher::Dispatcher;
pub use request::{Headers, Method, OutgoingRequest, RequestOptions};
pub use response::{HttpError, Response};
