//! Per-request telemetry
//!
//! Every connection whose URL became known produces exactly one
//! [`TelemetryRecord`]. Records go to a [`TelemetrySink`]; the file sink
//! appends them as JSON lines from a background task so handlers never wait
//! on the log file.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub request_id: u64,
    pub url: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Seconds between start and end
    pub elapsed_time: f64,
}

/// Identity and timing of one handled connection.
#[derive(Debug)]
pub struct RequestContext {
    pub id: u64,
    pub url: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn begin(id: u64) -> Self {
        Self {
            id,
            url: None,
            started_at: Utc::now(),
        }
    }

    /// Closes the context. Yields a record only if a URL was established.
    pub fn finish(self) -> Option<TelemetryRecord> {
        let url = self.url?;
        let end_time = Utc::now();
        let elapsed = end_time - self.started_at;

        Some(TelemetryRecord {
            request_id: self.id,
            url,
            start_time: self.started_at,
            end_time,
            elapsed_time: elapsed.num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6,
        })
    }
}

pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: TelemetryRecord);
}

/// Drops every record.
#[derive(Debug, Default)]
pub struct DiscardSink;

impl TelemetrySink for DiscardSink {
    fn record(&self, _record: TelemetryRecord) {}
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, record: TelemetryRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

/// Appends records to a file, one JSON object per line.
///
/// Records are queued and written by a background task. Call
/// [`FileSink::close`] before exiting, or queued records are lost.
pub struct FileSink {
    tx: Mutex<Option<mpsc::UnboundedSender<TelemetryRecord>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl FileSink {
    /// Opens `path` for appending and starts the writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<TelemetryRecord>();
        let log_path = path.display().to_string();

        let writer = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let mut line = match serde_json::to_vec(&record) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to encode telemetry record");
                        continue;
                    }
                };
                line.push(b'\n');

                if let Err(e) = file.write_all(&line).await {
                    tracing::warn!(path = %log_path, error = %e, "Failed to append telemetry record");
                    continue;
                }
                if let Err(e) = file.flush().await {
                    tracing::warn!(path = %log_path, error = %e, "Failed to flush telemetry log");
                }
            }
        });

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Stops accepting records and waits until the queued ones are written.
    ///
    /// Records arriving afterwards are dropped. Closing twice is a no-op.
    pub async fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }

        let writer = self.writer.lock().ok().and_then(|mut w| w.take());
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                tracing::warn!(error = %e, "Telemetry writer task failed");
            }
        }
    }
}

impl TelemetrySink for FileSink {
    fn record(&self, record: TelemetryRecord) {
        let sent = match self.tx.lock() {
            Ok(tx) => tx.as_ref().is_some_and(|tx| tx.send(record).is_ok()),
            Err(_) => false,
        };
        if !sent {
            tracing::warn!("Telemetry writer has stopped; record dropped");
        }
    }
}
