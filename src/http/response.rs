//! Response decoding and status mapping.

use hyper::body::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::request::Headers;

/// A decoded success response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    /// Decoded JSON body; `Value::Null` for an empty body.
    pub body: Value,
}

impl Response {
    /// Deserialize the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|source| Error::Decode {
            source,
            body: self.body.to_string(),
        })
    }
}

/// Non-success status returned by the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub status: u16,
    /// Decoded error body when the cluster sent valid JSON.
    pub body: Option<Value>,
    /// Raw response text.
    pub raw: String,
}

impl HttpError {
    /// `error.type` from the conventional error envelope.
    pub fn error_type(&self) -> Option<&str> {
        self.body.as_ref()?.get("error")?.get("type")?.as_str()
    }

    /// `error.reason`, or a plain string `error` field.
    pub fn reason(&self) -> Option<&str> {
        let error = self.body.as_ref()?.get("error")?;
        error
            .get("reason")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        match (self.error_type(), self.reason()) {
            (Some(kind), Some(reason)) => write!(f, " ({}): {}", kind, reason),
            (None, Some(reason)) => write!(f, ": {}", reason),
            _ => Ok(()),
        }
    }
}

/// Parse a response body. Empty bodies decode to `null`.
pub fn decode_body(bytes: &Bytes) -> std::result::Result<Value, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
}

/// Map status plus decoded body to the caller-facing result.
///
/// On success statuses a decode failure is a [`Error::Decode`]; on error statuses the
/// raw text is kept and the body attached only if it was valid JSON.
pub fn map_response(
    status: u16,
    headers: Headers,
    bytes: &Bytes,
    decoded: std::result::Result<Value, serde_json::Error>,
) -> Result<Response> {
    if (200..300).contains(&status) {
        match decoded {
            Ok(body) => Ok(Response { status, headers, body }),
            Err(source) => Err(Error::Decode {
                source,
                body: String::from_utf8_lossy(bytes).into_owned(),
            }),
        }
    } else {
        Err(Error::Http(HttpError {
            status,
            body: decoded.ok().filter(|v| !v.is_null()),
            raw: String::from_utf8_lossy(bytes).into_owned(),
        }))
    }
}
