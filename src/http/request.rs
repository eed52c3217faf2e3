//! Outgoing request construction.
//!
//! # Responsibilities
//! - Join caller params onto the path as an urlencoded query string
//! - Encode the JSON body once, before signing
//! - Convert the signed request into a wire request for one connection

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, HOST};
use serde_json::Value;
use std::time::Duration;

use crate::config::Endpoint;
use crate::error::{Error, Result};

/// HTTP methods understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for hyper::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => hyper::Method::GET,
            Method::Post => hyper::Method::POST,
            Method::Put => hyper::Method::PUT,
            Method::Delete => hyper::Method::DELETE,
        }
    }
}

/// Ordered header list. Keys may repeat.
pub type Headers = Vec<(String, String)>;

/// A request on its way through signing and dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    pub method: Method,
    /// Path relative to the endpoint, including any query string.
    pub path: String,
    pub headers: Headers,
    /// Encoded body exactly as it goes on the wire.
    pub body: Option<Bytes>,
}

impl OutgoingRequest {
    /// Build a request from caller input.
    pub fn new(method: Method, path: &str, body: Option<&Value>, params: &[(&str, &str)], headers: &[(&str, &str)]) -> Self {
        let mut headers: Headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let body = body.map(|value| Bytes::from(value.to_string()));
        if body.is_some() && !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }

        Self {
            method,
            path: with_query(path, params),
            headers,
            body,
        }
    }

    /// Body as text, for logs and telemetry.
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Convert into a wire request addressed to `endpoint`.
    pub fn to_wire(&self, endpoint: &Endpoint) -> Result<hyper::Request<Full<Bytes>>> {
        let target = format!("{}{}", endpoint.base_path, self.path);
        let mut builder = hyper::Request::builder()
            .method(hyper::Method::from(self.method))
            .uri(target.as_str())
            .header(HOST, endpoint.authority());

        let wire_headers = builder
            .headers_mut()
            .ok_or_else(|| Error::InvalidRequest(format!("invalid request target '{}'", target)))?;
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidRequest(format!("invalid header name '{}'", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::InvalidRequest(format!("invalid value for header '{}'", name)))?;
            wire_headers.append(name, value);
        }

        let body = self.body.clone().unwrap_or_default();
        builder
            .body(Full::new(body))
            .map_err(|e| Error::InvalidRequest(e.to_string()))
    }
}

/// Append `params` to `path`, normalising the leading slash.
fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    let mut path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    if params.is_empty() {
        return path;
    }

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().copied())
        .finish();
    path.push(if path.contains('?') { '&' } else { '?' });
    path.push_str(&query);
    path
}

/// Per-request options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Overrides `conn_opts.pool_timeout_ms`.
    pub pool_timeout: Option<Duration>,
    /// Overrides `conn_opts.receive_timeout_ms`.
    pub receive_timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn with_pool_timeout(mut self, timeout: Duration) -> Self {
        self.pool_timeout = Some(timeout);
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }
}
