//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - GatewayConfig: Where the Pi's api lives (or simulate it).
//!     - HistoryConfig: Rolling window size and snapshot directory.
//!     - StreamsConfig: Per-sensor poll period and overlap guard.
//!     - ActuationConfig: Pump threshold and auto relay commands.
//!     - ServerConfig / LoggingConfig.
//!
//! ==============================================================================

use crate::decision::DEFAULT_THRESHOLD;
use crate::domain::StreamKind;
use crate::history::DEFAULT_CAPACITY;

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    pub gateway: GatewayConfig,
    pub history: HistoryConfig,
    pub streams: StreamsConfig,
    pub actuation: ActuationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    /// absent = a hung call only delays its own cycle
    pub request_timeout_ms: Option<u64>,
    pub simulate: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".to_string(),
            request_timeout_ms: None,
            simulate: false,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
    pub snapshot_dir: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            snapshot_dir: "data".to_string(),
        }
    }
}

/// any field left out of a `[streams.<name>]` table keeps its default
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StreamEntry {
    pub enabled: bool,
    /// absent = the stream's own default period
    pub interval_ms: Option<u64>,
    pub skip_if_busy: bool,
    pub history: bool,
}

impl Default for StreamEntry {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: None,
            skip_if_busy: false,
            history: true,
        }
    }
}

impl StreamEntry {
    pub fn interval_ms(&self, kind: StreamKind) -> u64 {
        self.interval_ms.unwrap_or_else(|| default_interval_ms(kind)).max(1)
    }

    pub fn interval(&self, kind: StreamKind) -> Duration {
        Duration::from_millis(self.interval_ms(kind))
    }
}

/// dashboard poll periods per sensor
pub fn default_interval_ms(kind: StreamKind) -> u64 {
    match kind {
        StreamKind::Distance => 1500,
        StreamKind::Temperature | StreamKind::Humidity => 3000,
        StreamKind::Light => 1000,
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StreamsConfig {
    pub distance: StreamEntry,
    pub temperature: StreamEntry,
    pub humidity: StreamEntry,
    pub light: StreamEntry,
}

impl StreamsConfig {
    pub fn entry(&self, kind: StreamKind) -> &StreamEntry {
        match kind {
            StreamKind::Distance => &self.distance,
            StreamKind::Temperature => &self.temperature,
            StreamKind::Humidity => &self.humidity,
            StreamKind::Light => &self.light,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ActuationConfig {
    pub threshold: f64,
    pub auto_command: bool,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            auto_command: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: false,
        }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
    }

    /// Load with default fallback
    ///
    /// runs before logging is set up, so it reports through the returned notes
    pub fn load_or_default() -> (Self, Vec<String>) {
        let paths = [
            std::path::PathBuf::from("config").join("host.toml"),
            std::path::PathBuf::from("..").join("config").join("host.toml"),
        ];
        let mut notes = Vec::new();

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        notes.push(format!("[CONFIG] Loaded from {}", path.display()));
                        return (config, notes);
                    }
                    Err(e) => {
                        notes.push(format!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e));
                    }
                }
            }
        }

        notes.push("[CONFIG] Warning: No config file found - using defaults".to_string());
        (Self::default(), notes)
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        tracing::info!("┌─────────────────────────────────────────┐");
        tracing::info!("│           HOST CONFIGURATION            │");
        tracing::info!("├─────────────────────────────────────────┤");
        if self.gateway.simulate {
            tracing::info!("│ Gateway: simulated");
        } else {
            tracing::info!("│ Gateway: {}", self.gateway.base_url);
        }
        tracing::info!("│ Timeout: {:?}", self.gateway.request_timeout());
        tracing::info!("│ History: {} readings in {}", self.history.capacity, self.history.snapshot_dir);
        for kind in StreamKind::ALL {
            let entry = self.streams.entry(kind);
            if entry.enabled {
                tracing::info!("│ {:<12} every {}ms", kind.name(), entry.interval_ms(kind));
            } else {
                tracing::info!("│ {:<12} disabled", kind.name());
            }
        }
        tracing::info!("│ Pump threshold: {} (auto: {})", self.actuation.threshold, self.actuation.auto_command);
        tracing::info!("│ Server: {}", self.server.bind);
        tracing::info!("└─────────────────────────────────────────┘");
    }
}
