// HS110 - smart plug wire protocol and metrics pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration types for the poller

use crate::error::ConfigError;
use std::time::Duration;

/// Default poll interval in milliseconds
pub const DEFAULT_POLL_MILLIS: u32 = 5000;

/// Port the plug listens on
pub const DEFAULT_DEVICE_PORT: u16 = 9999;

/// Poller configuration, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Time between the end of one tick and the start of the next
    pub poll_interval: Duration,

    /// Plug host name or address
    pub device_host: String,

    /// Plug port (default: 9999)
    pub device_port: u16,

    /// Push gateway host name or address
    pub gateway_host: String,

    /// Push gateway port (0 until configured)
    pub gateway_port: u16,

    /// Push gateway path, e.g. `/metrics/job/hs110`
    pub gateway_endpoint: String,

    /// Bound on every connect, read and write (default: none, block forever).
    /// A zero duration is rejected by [`Config::validate`].
    pub io_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_MILLIS as u64),
            device_host: String::new(),
            device_port: DEFAULT_DEVICE_PORT,
            gateway_host: String::new(),
            gateway_port: 0,
            gateway_endpoint: String::new(),
            io_timeout: None,
        }
    }
}

impl Config {
    /// Create a configuration with the required values and defaults elsewhere
    pub fn new(
        device_host: impl Into<String>,
        gateway_host: impl Into<String>,
        gateway_port: u16,
        gateway_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            device_host: device_host.into(),
            gateway_host: gateway_host.into(),
            gateway_port,
            gateway_endpoint: gateway_endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the poll interval in milliseconds
    pub fn with_poll_millis(mut self, millis: u32) -> Self {
        self.poll_interval = Duration::from_millis(millis as u64);
        self
    }

    /// Set the device port
    pub fn with_device_port(mut self, port: u16) -> Self {
        self.device_port = port;
        self
    }

    /// Set the socket timeout
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Check that every required value is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_host.is_empty() {
            return Err(ConfigError::Missing("TPLINK_HOST"));
        }
        if self.gateway_host.is_empty() {
            return Err(ConfigError::Missing("PUSH_GW_HOST"));
        }
        if self.gateway_port == 0 {
            return Err(ConfigError::Missing("PUSH_GW_PORT"));
        }
        if self.gateway_endpoint.is_empty() {
            return Err(ConfigError::Missing("PUSH_GW_ENDPOINT"));
        }
        if self.io_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Zero("IO_TIMEOUT_MILLIS"));
        }
        Ok(())
    }

    /// Gateway location for display
    pub fn gateway_uri(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.gateway_host, self.gateway_port, self.gateway_endpoint
        )
    }
}
