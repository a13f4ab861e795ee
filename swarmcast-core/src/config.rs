use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::node::NodeId;

/// Node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub node: NodeConfig,
    pub logging: LoggingConfig,
    pub hls: HlsConfig,
    pub rtmp: RtmpConfig,
    pub viz: VizConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8935,
        }
    }
}

/// Identity of this node in the overlay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// 64 hex characters. A random key is generated when unset.
    pub node_key: Option<String>,
    /// Statically known peers, reported by `/peersCount`.
    pub peers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// HLS playback and idle eviction timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HlsConfig {
    /// Ceiling on the readiness wait for a fresh buffer
    pub wait_time_ms: u64,
    /// Delay between two readiness polls
    pub poll_interval_ms: u64,
    /// Segments retained per buffer (12 hours at 1s segments)
    pub buffer_capacity: usize,
    /// Segments listed in a rendered playlist
    pub buffer_window: usize,
    /// Subscriptions idle for longer than this are evicted
    pub idle_limit_ms: u64,
    pub reaper_interval_ms: u64,
    pub reaper_enabled: bool,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            wait_time_ms: 10_000,
            poll_interval_ms: 2_000,
            buffer_capacity: 43_200,
            buffer_window: 5,
            idle_limit_ms: 20_000,
            reaper_interval_ms: 5_000,
            reaper_enabled: true,
        }
    }
}

impl HlsConfig {
    #[must_use]
    pub fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn idle_limit(&self) -> Duration {
        Duration::from_millis(self.idle_limit_ms)
    }

    #[must_use]
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtmpConfig {
    /// Packets buffered per viewer before new packets are dropped
    pub queue_capacity: usize,
}

impl Default for RtmpConfig {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

/// Streaming visualisation collector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    /// Base URL of the collector. Events are only logged when unset.
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub static_dir: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            static_dir: "static".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (SWARMCAST_SERVER_HOST, etc.)
        builder = builder.add_source(
            Environment::with_prefix("SWARMCAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check for misconfigurations that would make the node misbehave.
    ///
    /// Returns every problem found rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.hls.poll_interval_ms == 0 {
            errors.push("hls.poll_interval_ms must be greater than zero".to_string());
        }
        if self.hls.reaper_interval_ms == 0 {
            errors.push("hls.reaper_interval_ms must be greater than zero".to_string());
        }
        if self.hls.buffer_window == 0 {
            errors.push("hls.buffer_window must be greater than zero".to_string());
        }
        if self.hls.buffer_window > self.hls.buffer_capacity {
            errors.push(format!(
                "hls.buffer_window ({}) exceeds hls.buffer_capacity ({})",
                self.hls.buffer_window, self.hls.buffer_capacity
            ));
        }
        if self.rtmp.queue_capacity == 0 {
            errors.push("rtmp.queue_capacity must be greater than zero".to_string());
        }
        if let Some(key) = &self.node.node_key {
            if let Err(e) = key.parse::<NodeId>() {
                errors.push(format!("node.node_key is invalid: {e}"));
            }
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}
