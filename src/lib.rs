//! # HS110 - smart plug telemetry for Prometheus
//!
//! Polls a TP-Link HS110 smart plug over its obfuscated TCP protocol and
//! pushes relay state and energy readings to a Prometheus push gateway.
//!
//! ## Key Features
//!
//! - **Wire codec**: length-prefixed XOR autokey framing used by the plug
//! - **Strict extraction**: typed fields or a single error, never partial records
//! - **Stale-series cleanup**: a failed poll deletes the published group
//! - **Minimal HTTP/1.0**: POST/DELETE against the push gateway, no client stack
//!
//! ## Quick Start
//!
//! ```rust
//! use hs110::codec::{decode, encode, REQUEST_CAPACITY, RESPONSE_CAPACITY};
//! use hs110::telemetry::extract_sys_info;
//!
//! // Frame a request the way the plug expects it
//! let frame = encode(hs110::device::GET_SYSINFO.as_bytes(), REQUEST_CAPACITY).unwrap();
//! assert_eq!(&frame[..4], &[0, 0, 0, 31]);
//!
//! // Frames decode back to the original text
//! let text = decode(&frame, RESPONSE_CAPACITY).unwrap();
//! assert_eq!(text, hs110::device::GET_SYSINFO.as_bytes());
//!
//! // Pull the identity fields out of a response
//! let doc: serde_json::Value = serde_json::from_str(
//!     r#"{"system":{"get_sysinfo":{"alias":"Desk","deviceId":"01","mac":"AA","relay_state":1,"on_time":5}}}"#,
//! ).unwrap();
//! let info = extract_sys_info(&doc).unwrap();
//! assert_eq!(info.tags(), r#"alias="Desk",id="01",mac="AA""#);
//! ```
//!
//! ## Modules
//!
//! - [`codec`]: Frame encoding and decoding
//! - [`transport`]: TCP connections
//! - [`device`]: Request/response exchange with the plug
//! - [`telemetry`]: Typed records from device JSON
//! - [`exposition`]: Prometheus text format
//! - [`gateway`]: Push gateway publisher
//! - [`pipeline`]: Poll tick orchestration and the poll loop
//! - [`config`]: Poller configuration
//! - [`shutdown`]: Cancellation between ticks

// Modules
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod exposition;
pub mod gateway;
pub mod pipeline;
pub mod shutdown;
pub mod telemetry;
pub mod transport;

// Re-exports for convenient access
pub use config::Config;
pub use device::DeviceClient;
pub use error::{
    CodecError, ConfigError, DeviceError, Error, ExtractError, GatewayError, Result,
    TransportError,
};
pub use gateway::{GatewayRequest, GatewayResponse, MetricsSink, PushGateway};
pub use pipeline::{Connector, Pipeline, TcpConnector, TickOutcome, TickStage};
pub use shutdown::Shutdown;
pub use telemetry::{RealTime, SysInfo};
pub use transport::Connection;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
