// HS110 Pusher - Prometheus push gateway client for HS110 plugs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # HS110 Pusher
//!
//! Polls one TP-Link HS110 smart plug and pushes its telemetry to a
//! Prometheus push gateway until interrupted.
//!
//! ## Usage
//!
//! ```bash
//! # Configure through the environment
//! TPLINK_HOST=192.168.1.50 PUSH_GW_HOST=pushgateway PUSH_GW_PORT=9091 \
//!     PUSH_GW_ENDPOINT=/metrics/job/hs110 hs110-pusher
//!
//! # Or through flags
//! hs110-pusher --tplink-host 192.168.1.50 --push-gw-host pushgateway \
//!     --push-gw-port 9091 --push-gw-endpoint /metrics/job/hs110 --poll-time-millis 10000
//! ```

use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use hs110::config::{DEFAULT_DEVICE_PORT, DEFAULT_POLL_MILLIS};
use hs110::{Config, Pipeline, Shutdown};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// HS110 metrics pusher
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Poll interval in milliseconds
    #[arg(long, env = "POLL_TIME_MILLIS", default_value_t = DEFAULT_POLL_MILLIS)]
    poll_time_millis: u32,

    /// Smart plug host name or address
    #[arg(long, env = "TPLINK_HOST", value_parser = NonEmptyStringValueParser::new())]
    tplink_host: String,

    /// Smart plug port
    #[arg(long, env = "TPLINK_PORT", default_value_t = DEFAULT_DEVICE_PORT)]
    tplink_port: u16,

    /// Push gateway host name or address
    #[arg(long, env = "PUSH_GW_HOST", value_parser = NonEmptyStringValueParser::new())]
    push_gw_host: String,

    /// Push gateway port
    #[arg(long, env = "PUSH_GW_PORT")]
    push_gw_port: u16,

    /// Push gateway endpoint path, e.g. /metrics/job/hs110
    #[arg(long, env = "PUSH_GW_ENDPOINT", value_parser = NonEmptyStringValueParser::new())]
    push_gw_endpoint: String,

    /// Socket timeout in milliseconds, greater than zero (unset: block indefinitely)
    #[arg(long, env = "IO_TIMEOUT_MILLIS")]
    io_timeout_millis: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn to_config(&self) -> Config {
        Config::new(
            self.tplink_host.clone(),
            self.push_gw_host.clone(),
            self.push_gw_port,
            self.push_gw_endpoint.clone(),
        )
        .with_poll_millis(self.poll_time_millis)
        .with_device_port(self.tplink_port)
        .with_io_timeout(self.io_timeout_millis.map(Duration::from_millis))
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    // Also installs the bridge for the library's `log` records.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = args.to_config();
    if let Err(e) = config.validate() {
        error!("Could not load configuration: {} - exiting", e);
        return ExitCode::FAILURE;
    }

    info!("HS110 Pusher v{}", env!("CARGO_PKG_VERSION"));
    info!("Poll frequency: {} ms", config.poll_interval.as_millis());
    info!("Device: {}:{}", config.device_host, config.device_port);
    info!("Push gateway URI: {}", config.gateway_uri());
    if let Some(timeout) = config.io_timeout {
        info!("Socket timeout: {} ms", timeout.as_millis());
    }

    let shutdown = Shutdown::new();
    let handle = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || handle.trigger()) {
        error!("Could not set handler for interrupt signal: {}", e);
        return ExitCode::FAILURE;
    }

    let pipeline = Pipeline::from_config(&config);
    pipeline.run(&shutdown);

    info!("Received interrupt; exiting");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 7] = [
        "hs110-pusher",
        "--tplink-host",
        "plug.lan",
        "--push-gw-host",
        "gw.lan",
        "--push-gw-port",
        "9091",
    ];

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv: Vec<&str> = REQUIRED.to_vec();
        argv.extend_from_slice(&["--push-gw-endpoint", "/metrics/job/hs110"]);
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        let config = args.to_config();
        assert_eq!(config.poll_interval, Duration::from_millis(5000));
        assert_eq!(config.device_port, 9999);
        assert!(config.io_timeout.is_none());
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway_uri(), "http://gw.lan:9091/metrics/job/hs110");
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "--poll-time-millis",
            "250",
            "--tplink-port",
            "10000",
            "--io-timeout-millis",
            "1500",
        ])
        .unwrap();
        let config = args.to_config();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.device_port, 10000);
        assert_eq!(config.io_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_zero_timeout_fails_validation() {
        let config = parse(&["--io-timeout-millis", "0"]).unwrap().to_config();
        assert_eq!(
            config.validate(),
            Err(hs110::ConfigError::Zero("IO_TIMEOUT_MILLIS"))
        );
    }

    #[test]
    fn test_ports_must_be_numeric() {
        assert!(parse(&["--tplink-port", "tplink"]).is_err());
        let argv = [
            "hs110-pusher",
            "--tplink-host",
            "plug.lan",
            "--push-gw-host",
            "gw.lan",
            "--push-gw-port",
            "pushgateway",
            "--push-gw-endpoint",
            "/m",
        ];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_poll_interval_out_of_range() {
        assert!(parse(&["--poll-time-millis", "4294967296"]).is_err());
        assert!(parse(&["--poll-time-millis", "-1"]).is_err());
        assert!(parse(&["--poll-time-millis", "5s"]).is_err());
    }

    #[test]
    fn test_empty_host_rejected() {
        let argv = [
            "hs110-pusher",
            "--tplink-host",
            "",
            "--push-gw-host",
            "gw.lan",
            "--push-gw-port",
            "9091",
            "--push-gw-endpoint",
            "/m",
        ];
        assert!(Args::try_parse_from(argv).is_err());
    }
}
