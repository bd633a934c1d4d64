use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::cache::CacheKey;
use crate::deadline;
use crate::error::ProxyError;
use crate::http::parser::{find_headers_end, parse_http_request};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::proxy::context::ProxyContext;
use crate::proxy::origin::OriginResponse;
use crate::proxy::target::Target;
use crate::telemetry::RequestContext;

/// Handles one client connection from request to close.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ProxyContext>,
    buffer: Vec<u8>,
    request_ctx: RequestContext,
    state: ConnectionState,
}

pub enum ConnectionState {
    ReadRequest,
    ResolveTarget(Request),
    CheckCache(Request, Target),
    FetchOrigin(Request, Target, CacheKey),
    AdmitCache(CacheKey, OriginResponse),
    Respond(ResponseWriter),
    ErrorRespond(ProxyError),
    Closed,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, ctx: Arc<ProxyContext>) -> Self {
        let request_ctx = RequestContext::begin(ctx.requests.next());
        let buffer = Vec::with_capacity(ctx.read_buffer_size);

        Self {
            stream,
            peer,
            ctx,
            buffer,
            request_ctx,
            state: ConnectionState::ReadRequest,
        }
    }

    /// Drives the connection to completion.
    ///
    /// Errors are contained here: whatever happens, telemetry is recorded
    /// (if a URL was established) and the client socket is closed once.
    pub async fn run(mut self) {
        self.drive().await;

        let request_id = self.request_ctx.id;
        if let Some(record) = self.request_ctx.finish() {
            tracing::info!(
                request_id,
                url = %record.url,
                elapsed = record.elapsed_time,
                "Request completed"
            );
            self.ctx.telemetry.record(record);
        }

        let _ = self.stream.shutdown().await;
    }

    async fn drive(&mut self) {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

            self.state = match state {
                ConnectionState::ReadRequest => match self.read_request().await {
                    Ok(Some(req)) => ConnectionState::ResolveTarget(req),
                    Ok(None) => ConnectionState::Closed,
                    Err(e) => ConnectionState::ErrorRespond(e),
                },

                ConnectionState::ResolveTarget(req) => {
                    if !self.ctx.allows(&req.method) {
                        ConnectionState::ErrorRespond(ProxyError::MethodNotAllowed(
                            req.method.to_string(),
                        ))
                    } else {
                        match Target::resolve(&req.target) {
                            Ok(target) => ConnectionState::CheckCache(req, target),
                            Err(e) => ConnectionState::ErrorRespond(e),
                        }
                    }
                }

                ConnectionState::CheckCache(req, target) => {
                    let key = CacheKey::from_url(&req.target);

                    match self.ctx.cache.lookup(&key).await {
                        Ok(Some(cached)) => {
                            tracing::info!(
                                request_id = self.request_ctx.id,
                                url = %req.target,
                                bytes = cached.len(),
                                "Cache hit"
                            );
                            ConnectionState::Respond(ResponseWriter::raw(cached))
                        }
                        Ok(None) => {
                            tracing::debug!(request_id = self.request_ctx.id, url = %req.target, "Cache miss");
                            ConnectionState::FetchOrigin(req, target, key)
                        }
                        Err(e) => {
                            tracing::warn!(
                                request_id = self.request_ctx.id,
                                error = %e,
                                "Cache lookup failed, treating as miss"
                            );
                            ConnectionState::FetchOrigin(req, target, key)
                        }
                    }
                }

                ConnectionState::FetchOrigin(req, target, key) => {
                    match self.ctx.origin.fetch(&target, &req).await {
                        Ok(resp) if resp.status.is_success() => ConnectionState::AdmitCache(key, resp),
                        Ok(resp) => {
                            tracing::info!(
                                request_id = self.request_ctx.id,
                                origin = %target,
                                status = resp.status.as_u16(),
                                "Origin returned non-success status, not caching"
                            );
                            let reason = if resp.reason.is_empty() {
                                resp.status.reason_phrase()
                            } else {
                                resp.reason.as_str()
                            };
                            let detail = format!(
                                "Origin responded with {} {}",
                                resp.status.as_u16(),
                                reason
                            );
                            let response = Response::error_with_reason(resp.status, reason, &detail);
                            ConnectionState::Respond(ResponseWriter::new(&response))
                        }
                        Err(e) => {
                            tracing::warn!(
                                request_id = self.request_ctx.id,
                                origin = %target,
                                error = %e,
                                "Origin request failed"
                            );
                            ConnectionState::ErrorRespond(e)
                        }
                    }
                }

                ConnectionState::AdmitCache(key, resp) => {
                    match self.ctx.cache.store(&key, &resp.raw).await {
                        Ok(()) => tracing::debug!(request_id = self.request_ctx.id, key = %key, "Response cached"),
                        Err(e) => tracing::warn!(
                            request_id = self.request_ctx.id,
                            error = %e,
                            "Failed to cache response, serving uncached"
                        ),
                    }
                    ConnectionState::Respond(ResponseWriter::raw(resp.raw))
                }

                ConnectionState::ErrorRespond(e) => match e.status() {
                    Some(status) => {
                        let response = Response::error(status, &e.to_string());
                        ConnectionState::Respond(ResponseWriter::new(&response))
                    }
                    None => {
                        tracing::debug!(
                            request_id = self.request_ctx.id,
                            peer = %self.peer,
                            error = %e,
                            "Dropping connection"
                        );
                        ConnectionState::Closed
                    }
                },

                ConnectionState::Respond(writer) if writer.is_empty() => {
                    tracing::debug!(request_id = self.request_ctx.id, "Empty response, closing");
                    ConnectionState::Closed
                }

                ConnectionState::Respond(mut writer) => {
                    match writer.write_to_stream(&mut self.stream).await {
                        Ok(()) => tracing::debug!(
                            request_id = self.request_ctx.id,
                            bytes = writer.len(),
                            "Response sent"
                        ),
                        Err(e) => tracing::debug!(
                            request_id = self.request_ctx.id,
                            peer = %self.peer,
                            error = %e,
                            "Failed to write response"
                        ),
                    }
                    ConnectionState::Closed
                }

                ConnectionState::Closed => break,
            };
        }
    }

    /// Reads the request head and, when one is declared, the body.
    ///
    /// `Ok(None)` means there is nothing worth answering: the client sent
    /// nothing, garbage, or stalled before a request line arrived.
    async fn read_request(&mut self) -> Result<Option<Request>, ProxyError> {
        let limit = self.ctx.read_buffer_size;

        // Read until the end of the head, EOF, or the buffer bound
        let mut temp = [0u8; 1024];
        while find_headers_end(&self.buffer).is_none() && self.buffer.len() < limit {
            let want = temp.len().min(limit - self.buffer.len());
            match deadline::within(self.ctx.client_timeout, self.stream.read(&mut temp[..want])).await {
                Ok(0) => break,
                Ok(n) => self.buffer.extend_from_slice(&temp[..n]),
                Err(e) => {
                    tracing::debug!(peer = %self.peer, error = %e, "Client read failed");
                    break;
                }
            }
        }

        let (mut request, consumed) = match parse_http_request(&self.buffer) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(peer = %self.peer, error = ?e, "Malformed request, dropping connection");
                return Ok(None);
            }
        };

        self.request_ctx.url = Some(request.target.clone());
        tracing::debug!(
            request_id = self.request_ctx.id,
            method = %request.method,
            url = %request.target,
            version = %request.version,
            "Request received"
        );

        let content_length = request.content_length();
        if content_length > 0 {
            request.body = self.read_body(consumed, content_length).await?;
        }

        Ok(Some(request))
    }

    /// Reads exactly `len` body bytes, starting with those already buffered
    /// past the head.
    async fn read_body(&mut self, consumed: usize, len: usize) -> Result<Vec<u8>, ProxyError> {
        let buffered = &self.buffer[consumed.min(self.buffer.len())..];
        let mut body = buffered[..buffered.len().min(len)].to_vec();

        let remaining = (len - body.len()) as u64;
        if remaining > 0 {
            let mut rest = (&mut self.stream).take(remaining);
            deadline::within(self.ctx.client_timeout, rest.read_to_end(&mut body))
                .await
                .map_err(ProxyError::ClientIo)?;
        }

        if body.len() < len {
            return Err(ProxyError::ClientIo(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("body ended after {} of {} bytes", body.len(), len),
            )));
        }

        Ok(body)
    }
}
