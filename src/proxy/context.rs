//! State shared by every connection handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::deadline;
use crate::http::request::Method;
use crate::proxy::origin::OriginClient;
use crate::telemetry::TelemetrySink;

/// Source of request ids.
///
/// Ids start at 1 and strictly increase; each `next` is a single atomic
/// increment, so concurrent handlers never see the same id.
#[derive(Debug, Default)]
pub struct RequestCounter(AtomicU64);

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Everything a connection handler needs besides its socket.
pub struct ProxyContext {
    pub cache: CacheStore,
    pub origin: OriginClient,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub requests: RequestCounter,
    /// Methods the proxy forwards; others get 405
    pub allowed_methods: Vec<Method>,
    /// Upper bound on the bytes read while looking for the request head
    pub read_buffer_size: usize,
    /// Deadline for each read from the client
    pub client_timeout: Option<Duration>,
}

impl ProxyContext {
    /// A context with the default policy: all standard methods, a 4 KiB
    /// head buffer and no client deadline.
    pub fn new(cache: CacheStore, origin: OriginClient, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            cache,
            origin,
            telemetry,
            requests: RequestCounter::new(),
            allowed_methods: Method::standard(),
            read_buffer_size: 4096,
            client_timeout: None,
        }
    }

    /// Builds the context described by `cfg`, creating the cache root.
    pub fn from_config(cfg: &Config, telemetry: Arc<dyn TelemetrySink>) -> anyhow::Result<Self> {
        let cache = CacheStore::open(&cfg.cache_dir)
            .with_context(|| format!("Failed to open cache at {}", cfg.cache_dir.display()))?;

        let origin = OriginClient::new(
            deadline::from_secs(cfg.connect_timeout_secs),
            deadline::from_secs(cfg.origin_timeout_secs),
        );

        Ok(Self {
            allowed_methods: cfg.methods()?,
            read_buffer_size: cfg.read_buffer_size,
            client_timeout: deadline::from_secs(cfg.client_timeout_secs),
            ..Self::new(cache, origin, telemetry)
        })
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }
}
