//! Optional deadlines for blocking socket operations.

use std::future::Future;
use std::io;
use std::time::Duration;

/// Runs `fut` under an optional deadline.
///
/// `None` waits indefinitely. An expired deadline is reported as an
/// `io::ErrorKind::TimedOut` error so callers can fold it into their
/// regular I/O error handling.
pub async fn within<F, T>(limit: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("deadline of {:?} elapsed", limit),
            )),
        },
        None => fut.await,
    }
}

/// Converts a configured number of seconds into a deadline.
pub fn from_secs(secs: Option<u64>) -> Option<Duration> {
    secs.map(Duration::from_secs)
}
