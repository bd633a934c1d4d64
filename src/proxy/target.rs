//! Request target resolution
//!
//! Turns the raw target of a proxy request line into the origin host, port
//! and path. Two forms are accepted:
//!
//! - absolute URIs: `http://www.example.com:8080/page?q=1`
//! - host-rooted paths: `/www.example.com/page`
//!
//! Whatever scheme the client names, the origin is always spoken to in plain
//! HTTP, with port 80 unless one is given.

use std::fmt;

use url::Url;

use crate::error::ProxyError;

const DEFAULT_PORT: u16 = 80;

/// Where a request is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Origin host name or address literal (IPv6 literals keep their brackets)
    pub host: String,
    /// Origin port, 1-65535
    pub port: u16,
    /// Path and query sent on the origin request line
    pub path: String,
}

impl Target {
    /// Resolves a raw request target.
    ///
    /// No DNS lookup happens here; an unknown host only fails later, when
    /// the origin connection is attempted.
    pub fn resolve(raw: &str) -> Result<Self, ProxyError> {
        let rest = strip_scheme(raw);
        let rest = rest.strip_prefix('/').unwrap_or(rest);

        if rest.is_empty() || rest.starts_with(['/', ':', '?']) {
            return Err(ProxyError::malformed_target(raw, "missing host"));
        }

        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, path) = rest.split_at(authority_end);

        // Only host and port go through the URL parser; the path is forwarded
        // exactly as the client wrote it.
        let url = Url::parse(&format!("http://{}/", authority))
            .map_err(|e| ProxyError::malformed_target(raw, e.to_string()))?;
        if url.path() != "/" || url.query().is_some() {
            return Err(ProxyError::malformed_target(raw, "invalid authority"));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ProxyError::malformed_target(raw, "missing host"))?;

        let port = url.port().unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ProxyError::malformed_target(raw, "port out of range"));
        }

        let path = path.split_once('#').map_or(path, |(before, _)| before);
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        Ok(Self {
            host: host.to_string(),
            port,
            path,
        })
    }

    /// `host:port`, suitable for connecting.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Value for the `Host` header of the origin request.
    pub fn host_header(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.host.clone()
        } else {
            self.authority()
        }
    }
}

/// Strips a leading `scheme://`. A `://` anywhere else (say, inside a
/// query string) is left alone.
fn strip_scheme(raw: &str) -> &str {
    let Some(pos) = raw.find("://") else {
        return raw;
    };

    let mut scheme = raw[..pos].chars();
    let is_scheme = scheme.next().is_some_and(|c| c.is_ascii_alphabetic())
        && scheme.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    if is_scheme { &raw[pos + 3..] } else { raw }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.host, self.port, self.path)
    }
}
