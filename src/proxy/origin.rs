//! Origin connection and request forwarding
//!
//! This module handles connecting to origin servers, sending a minimal
//! HTTP/1.0 request and buffering the complete response in memory.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::deadline;
use crate::error::ProxyError;
use crate::http::request::{Method, Request};
use crate::http::response::StatusCode;
use crate::proxy::target::Target;

/// Default read chunk size
const BUFFER_SIZE: usize = 4096;

/// A response exactly as the origin sent it.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    /// Status code parsed from the status line
    pub status: StatusCode,
    /// Reason phrase from the status line (may be empty)
    pub reason: String,
    /// Status line, headers and body, untouched
    pub raw: Bytes,
}

/// Fetches responses from origin servers, one fresh connection per request.
#[derive(Debug, Clone)]
pub struct OriginClient {
    /// Deadline for establishing the connection
    connect_timeout: Option<Duration>,

    /// Deadline for sending the request and reading the whole response
    io_timeout: Option<Duration>,
}

impl Default for OriginClient {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl OriginClient {
    /// Create a new origin client. `None` disables the matching deadline.
    pub fn new(connect_timeout: Option<Duration>, io_timeout: Option<Duration>) -> Self {
        Self {
            connect_timeout,
            io_timeout,
        }
    }

    /// Forward `request` to `target` and buffer the full response.
    ///
    /// The origin socket is owned by this call and closed before it returns,
    /// whichever way it returns.
    pub async fn fetch(&self, target: &Target, request: &Request) -> Result<OriginResponse, ProxyError> {
        let addr = target.authority();

        let mut stream = deadline::within(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|source| ProxyError::OriginUnreachable {
                addr: addr.clone(),
                source,
            })?;

        tracing::trace!(origin = %addr, "Connected to origin");

        let request_bytes = build_http_request(request, target);
        let raw = deadline::within(
            self.io_timeout,
            send_request_and_receive_response(&mut stream, &request_bytes),
        )
        .await
        .map_err(ProxyError::OriginIo)?;

        drop(stream);

        let (status, reason) = parse_status_line(&raw)?;

        Ok(OriginResponse {
            status,
            reason,
            raw,
        })
    }
}

async fn send_request_and_receive_response(
    stream: &mut TcpStream,
    request_bytes: &[u8],
) -> std::io::Result<Bytes> {
    stream.write_all(request_bytes).await?;
    stream.flush().await?;

    tracing::trace!("Request sent to origin");

    // EOF marks the end of the response
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    loop {
        buffer.reserve(BUFFER_SIZE);
        let n = stream.read_buf(&mut buffer).await?;
        if n == 0 {
            break;
        }
    }

    Ok(buffer.freeze())
}

/// Build the request bytes sent to the origin.
///
/// Only the request line, `Host` and, when needed, `Content-Length` are
/// sent; the client's own headers are not relayed.
pub fn build_http_request(request: &Request, target: &Target) -> Vec<u8> {
    let mut buffer = Vec::new();

    // Request line
    buffer.extend_from_slice(
        format!("{} {} HTTP/1.0\r\n", request.method, target.path).as_bytes()
    );

    buffer.extend_from_slice(format!("Host: {}\r\n", target.host_header()).as_bytes());

    if request.method == Method::POST || !request.body.is_empty() {
        buffer.extend_from_slice(
            format!("Content-Length: {}\r\n", request.body.len()).as_bytes()
        );
    }

    // End of headers
    buffer.extend_from_slice(b"\r\n");

    buffer.extend_from_slice(&request.body);

    buffer
}

/// Parse `HTTP/x.y CODE reason` from the start of a response.
pub fn parse_status_line(raw: &[u8]) -> Result<(StatusCode, String), ProxyError> {
    let line_end = raw
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(raw.len());
    let line = String::from_utf8_lossy(&raw[..line_end]);
    let line = line.trim_end_matches('\r');

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(ProxyError::MalformedResponse(format!(
            "invalid status line: {:?}",
            line
        )));
    }

    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(StatusCode::from_u16)
        .ok_or_else(|| ProxyError::MalformedResponse(format!("invalid status code in {:?}", line)))?;

    let reason = parts.next().unwrap_or_default().trim().to_string();

    Ok((status, reason))
}
