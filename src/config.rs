use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::http::request::Method;

/// Process configuration.
///
/// Loaded from an optional YAML file; every field has a default, so an
/// empty file (or none at all) is a valid configuration. A `null` timeout
/// disables that deadline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Cache root directory
    #[serde(alias = "cacheDir")]
    pub cache_dir: PathBuf,
    /// Telemetry JSON-lines file
    #[serde(alias = "logPath")]
    pub log_path: Option<PathBuf>,
    pub read_buffer_size: usize,
    pub client_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub origin_timeout_secs: Option<u64>,
    pub allowed_methods: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            cache_dir: PathBuf::from("./cache"),
            log_path: None,
            read_buffer_size: 4096,
            client_timeout_secs: Some(30),
            connect_timeout_secs: Some(10),
            origin_timeout_secs: Some(60),
            allowed_methods: Method::standard()
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Loads the configuration from `path`, or the defaults without one.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let cfg = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_yaml(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Self::default(),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        // An empty document deserializes to unit, not to a map
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.read_buffer_size == 0 {
            anyhow::bail!("read_buffer_size must be greater than zero");
        }

        for (name, value) in [
            ("client_timeout_secs", self.client_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("origin_timeout_secs", self.origin_timeout_secs),
        ] {
            if value == Some(0) {
                anyhow::bail!("{} must be greater than zero (use null to disable)", name);
            }
        }

        self.methods()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The allowed methods, parsed.
    pub fn methods(&self) -> anyhow::Result<Vec<Method>> {
        self.allowed_methods
            .iter()
            .map(|m| {
                Method::from_str(m).with_context(|| format!("Invalid method in allowed_methods: {:?}", m))
            })
            .collect()
    }
}
