//! Shared helpers: an in-process mock origin, a proxy bound to an ephemeral
//! port, and a one-shot client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use larder::cache::CacheStore;
use larder::proxy::{OriginClient, ProxyContext};
use larder::server::listener::serve;
use larder::telemetry::MemorySink;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Barrier;

/// What the mock origin does with each connection.
#[derive(Clone)]
pub enum Behavior {
    /// Read the request, send these bytes, close.
    Respond(Vec<u8>),
    /// Like `Respond`, but only once every party has reached the barrier.
    RespondTogether(Arc<Barrier>, Vec<u8>),
    /// Accept and never answer.
    Hang,
}

pub struct MockOrigin {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockOrigin {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (task_hits, task_requests) = (hits.clone(), requests.clone());
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                task_hits.fetch_add(1, Ordering::SeqCst);

                let behavior = behavior.clone();
                let requests = task_requests.clone();
                tokio::spawn(async move {
                    if let Behavior::Hang = behavior {
                        let _held = socket;
                        std::future::pending::<()>().await;
                        return;
                    }

                    let request = read_full_request(&mut socket).await;
                    requests.lock().unwrap().push(request);

                    let response = match behavior {
                        Behavior::Respond(bytes) => bytes,
                        Behavior::RespondTogether(barrier, bytes) => {
                            barrier.wait().await;
                            bytes
                        }
                        Behavior::Hang => unreachable!(),
                    };
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            addr,
            hits,
            requests,
        }
    }

    pub async fn respond(bytes: &[u8]) -> Self {
        Self::start(Behavior::Respond(bytes.to_vec())).await
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Reads a request head plus its Content-Length body.
async fn read_full_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut temp = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut temp).await.unwrap_or(0);
        if n == 0 {
            return buf;
        }
        buf.extend_from_slice(&temp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut temp).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&temp[..n]);
    }

    buf
}

pub struct TestProxy {
    pub addr: SocketAddr,
    pub ctx: Arc<ProxyContext>,
    pub telemetry: Arc<MemorySink>,
    pub cache_dir: TempDir,
}

impl TestProxy {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut ProxyContext)) -> Self {
        let cache_dir = TempDir::new().unwrap();
        let telemetry = Arc::new(MemorySink::new());

        let mut ctx = ProxyContext::new(
            CacheStore::open(cache_dir.path()).unwrap(),
            OriginClient::default(),
            telemetry.clone(),
        );
        configure(&mut ctx);
        let ctx = Arc::new(ctx);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, ctx.clone()));

        Self {
            addr,
            ctx,
            telemetry,
            cache_dir,
        }
    }

    /// Sends `raw`, half-closes, and returns everything the proxy wrote
    /// before closing the connection.
    pub async fn send(&self, raw: &[u8]) -> Vec<u8> {
        send_to(self.addr, raw).await
    }

    pub async fn get(&self, url: &str) -> Vec<u8> {
        self.send(format!("GET {} HTTP/1.0\r\n\r\n", url).as_bytes()).await
    }

    pub fn cache_files(&self) -> Vec<String> {
        std::fs::read_dir(self.cache_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

pub async fn send_to(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    stream.shutdown().await.unwrap();

    // A reset after the proxy closes still leaves what it wrote in `response`
    let mut response = Vec::new();
    let _ = stream.read_to_end(&mut response).await;
    response
}
