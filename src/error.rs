//! Error taxonomy for a single proxied request.
//!
//! Every error here is contained to the connection that raised it. The
//! request handler decides, per kind, whether the client gets a synthesized
//! response or whether the connection is simply dropped.

use std::io;

use crate::http::response::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The request line could not be parsed. Never answered.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The client went away or stalled while we were still reading.
    #[error("client I/O error: {0}")]
    ClientIo(#[source] io::Error),

    #[error("malformed target `{target}`: {reason}")]
    MalformedTarget { target: String, reason: String },

    #[error("method {0} is not allowed")]
    MethodNotAllowed(String),

    #[error("origin {addr} unreachable: {source}")]
    OriginUnreachable {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("origin I/O error: {0}")]
    OriginIo(#[source] io::Error),

    #[error("malformed origin response: {0}")]
    MalformedResponse(String),
}

impl ProxyError {
    pub fn malformed_target(target: &str, reason: impl Into<String>) -> Self {
        ProxyError::MalformedTarget {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Status code of the synthesized response for this error.
    ///
    /// `None` means the connection is dropped without writing anything.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProxyError::MalformedRequest(_) | ProxyError::ClientIo(_) => None,
            ProxyError::MalformedTarget { .. } => Some(StatusCode::INTERNAL_SERVER_ERROR),
            ProxyError::MethodNotAllowed(_) => Some(StatusCode::METHOD_NOT_ALLOWED),
            ProxyError::OriginUnreachable { source, .. } | ProxyError::OriginIo(source)
                if source.kind() == io::ErrorKind::TimedOut =>
            {
                Some(StatusCode::GATEWAY_TIMEOUT)
            }
            ProxyError::OriginUnreachable { .. }
            | ProxyError::OriginIo(_)
            | ProxyError::MalformedResponse(_) => Some(StatusCode::BAD_GATEWAY),
        }
    }
}
