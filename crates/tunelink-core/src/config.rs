//! Link configuration
//!
//! Tunables for the endpoint scanner, the transport layer and the stream
//! reader, persisted as JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::hardware::{PortFilter, SIMULATOR_TCP_PORT};
use crate::transport::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS, READ_BUFFER_SIZE};

/// Delay between two scanner cycles
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300;

/// Connect timeout for the simulator port probe
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 50;

/// Errors from loading or saving a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Endpoint scanner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Sleep between poll cycles in milliseconds
    pub poll_interval_ms: u64,
    /// Always list the SocketCAN endpoint
    pub show_socket_can: bool,
    /// Serial port names that are platform noise
    pub port_filters: Vec<PortFilter>,
    /// TCP port the simulator listens on
    pub simulator_port: u16,
    /// Connect timeout for the simulator probe in milliseconds
    pub probe_timeout_ms: u64,
}

impl ScannerConfig {
    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Simulator probe timeout as a [`Duration`]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            show_socket_can: cfg!(target_os = "linux"),
            port_filters: PortFilter::defaults(),
            simulator_port: SIMULATOR_TCP_PORT,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

/// Settings used when opening a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Serial baud rate
    pub baud_rate: u32,
    /// Serial read timeout and TCP connect timeout in milliseconds
    pub timeout_ms: u64,
}

impl TransportConfig {
    /// Timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Stream reader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Size of the reusable read buffer
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: READ_BUFFER_SIZE,
        }
    }
}

/// Complete configuration for an application using this crate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Endpoint scanner settings
    pub scanner: ScannerConfig,
    /// Transport settings
    pub transport: TransportConfig,
    /// Stream reader settings
    pub reader: ReaderConfig,
    /// Endpoint identifier to connect to whenever it shows up
    pub auto_connect: Option<String>,
}

impl LinkConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
