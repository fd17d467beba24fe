//! Configuration loading from TOML
//!
//! # Configuration File Format
//!
//! Sender (`megha-tx`):
//!
//! ```toml
//! device = "synthetic"
//! driver_config = "config.json"   # opaque, handed to the sensor SDK
//! target = "192.168.68.100:9999"
//! min_range = 0.1                 # metres
//! max_range = 20.0                # metres
//! downsample = 1                  # keep every Nth raw point
//! checksum = false
//! send_timeout_ms = 100
//! ```
//!
//! Receiver (`megha-rx`):
//!
//! ```toml
//! bind = "0.0.0.0:9999"
//! frame_period_s = 0.05           # 20 Hz frames
//! max_frame_points = 120000
//! validate_checksum = true
//! ```
//!
//! Both binaries also accept CLI flags and environment variables that
//! override the file; see the binary `--help` output. Values are validated
//! once at startup and out-of-range settings refuse to start.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Ceiling for the sender's socket write timeout; the driver callback must
/// never block longer than this on the socket.
pub const MAX_SEND_TIMEOUT_MS: u64 = 100;

/// Sender daemon configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Device type ("synthetic"; real SDK bindings register their own name)
    pub device: String,

    /// Opaque path handed to the sensor SDK (network config, calibration)
    pub driver_config: String,

    /// Destination endpoint, "host:port"
    pub target: String,

    /// Distance gate lower bound in metres
    pub min_range: f32,

    /// Distance gate upper bound in metres
    pub max_range: f32,

    /// Keep every Nth raw point (1 = keep all)
    pub downsample: u32,

    /// Attach CRC-32 to every datagram (and self-test the engine at startup)
    pub checksum: bool,

    /// Socket write timeout in milliseconds (1..=100)
    pub send_timeout_ms: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            device: "synthetic".to_string(),
            driver_config: String::new(),
            target: "127.0.0.1:9999".to_string(),
            min_range: 0.1,
            max_range: 20.0,
            downsample: 1,
            checksum: false,
            send_timeout_ms: MAX_SEND_TIMEOUT_MS,
        }
    }
}

impl SenderConfig {
    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        basic_toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Validate ranges; called once at startup
    pub fn validate(&self) -> Result<()> {
        if self.min_range < 0.0 {
            return Err(Error::Config(format!(
                "min_range must be non-negative (got {})",
                self.min_range
            )));
        }
        if self.max_range <= self.min_range {
            return Err(Error::Config(format!(
                "max_range ({}) must exceed min_range ({})",
                self.max_range, self.min_range
            )));
        }
        if self.downsample == 0 {
            return Err(Error::Config("downsample must be >= 1".to_string()));
        }
        if self.send_timeout_ms == 0 || self.send_timeout_ms > MAX_SEND_TIMEOUT_MS {
            return Err(Error::Config(format!(
                "send_timeout_ms must be within 1..={} (got {})",
                MAX_SEND_TIMEOUT_MS, self.send_timeout_ms
            )));
        }
        if self.target.is_empty() {
            return Err(Error::Config("target endpoint is required".to_string()));
        }
        Ok(())
    }
}

/// Receiver daemon configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Address to bind the UDP socket, "host:port"
    pub bind: String,

    /// Frame window length in seconds
    pub frame_period_s: f64,

    /// Capacity bound on points per frame
    pub max_frame_points: usize,

    /// Verify CRC-32 on datagrams that carry one
    pub validate_checksum: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9999".to_string(),
            frame_period_s: 0.05,
            max_frame_points: 120_000,
            validate_checksum: true,
        }
    }
}

impl ReceiverConfig {
    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        basic_toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Validate ranges; called once at startup
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_period_s > 0.0) {
            return Err(Error::Config(format!(
                "frame_period_s must be positive (got {})",
                self.frame_period_s
            )));
        }
        if self.max_frame_points == 0 {
            return Err(Error::Config("max_frame_points must be >= 1".to_string()));
        }
        if self.bind.is_empty() {
            return Err(Error::Config("bind address is required".to_string()));
        }
        Ok(())
    }
}
