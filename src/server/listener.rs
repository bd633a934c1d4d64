use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::http::connection::Connection;
use crate::proxy::context::ProxyContext;
use crate::telemetry::{DiscardSink, FileSink, TelemetrySink};

/// Starts the proxy described by `cfg` and serves until `shutdown`
/// completes.
///
/// On shutdown the telemetry log is drained before returning. Connections
/// still in flight may finish after that; their records are dropped.
pub async fn run(cfg: &Config, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
    let log = match cfg.log_path.as_deref() {
        Some(path) => {
            let sink = FileSink::open(path)
                .await
                .with_context(|| format!("Failed to open telemetry log {}", path.display()))?;
            info!("Recording requests to {}", path.display());
            Some(Arc::new(sink))
        }
        None => None,
    };
    let telemetry: Arc<dyn TelemetrySink> = match &log {
        Some(sink) => sink.clone(),
        None => Arc::new(DiscardSink),
    };
    let ctx = Arc::new(ProxyContext::from_config(cfg, telemetry)?);

    let listener = TcpListener::bind(cfg.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", cfg.listen_addr()))?;
    info!("Listening on {}", listener.local_addr()?);
    info!("Caching responses under {}", ctx.cache.root().display());

    let result = tokio::select! {
        res = serve(listener, ctx) => res,
        _ = shutdown => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    if let Some(sink) = log {
        sink.close().await;
    }

    result
}

/// Accept loop: one spawned handler per connection, never waiting on one
/// before accepting the next.
pub async fn serve(listener: TcpListener, ctx: Arc<ProxyContext>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept connection");
                continue;
            }
        };
        info!("Accepted connection from {}", peer);

        let conn = Connection::new(socket, peer, ctx.clone());
        tokio::spawn(conn.run());
    }
}
