//! Error types for the HS110 pipeline
//!
//! Every failure a tick can hit has a typed variant here. None of them is
//! fatal to the process: the pipeline logs them and either abandons the tick
//! or drops the publish.

use thiserror::Error;

/// Result type alias for HS110 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for HS110 operations
#[derive(Error, Debug)]
pub enum Error {
    /// Socket-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame encode/decode failure
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Device answered with something unusable
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Decoded payload is not valid JSON
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON did not have the expected shape
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Push gateway refused or garbled the exchange
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(TransportError::Io(err))
    }
}

/// Errors opening, writing to or reading from a TCP peer
#[derive(Error, Debug)]
pub enum TransportError {
    /// Name resolution failed
    #[error("Could not resolve '{target}': {source}")]
    Resolve {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// No resolved address accepted the connection
    #[error("Could not connect to {target} ({attempts} address(es) tried)")]
    Connect { target: String, attempts: usize },

    /// A single write delivered fewer bytes than requested
    #[error("Short write: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Any other socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors during frame encoding or decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Output capacity exceeded
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Fewer bytes than the length prefix
    #[error("Message too short: received {received} bytes")]
    TooShort { received: usize },

    /// Body length disagrees with the length prefix
    #[error("Length mismatch: frame declares {declared} bytes, carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Peer closed the connection before the declared length arrived
    #[error("Truncated frame: expected {expected} bytes, connection closed after {received}")]
    Truncated { expected: usize, received: usize },
}

/// Errors in an otherwise well-formed device exchange
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The response parsed to JSON `null`
    #[error("Device returned an empty document")]
    EmptyResponse,
}

/// Errors walking a device JSON document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The document root is not an object
    #[error("The {record} JSON response was not a JSON object")]
    NotAnObject { record: &'static str },

    /// A container key is absent or not an object
    #[error("The JSON response did not contain a '{key}' key with an object value")]
    MissingObject { key: &'static str },

    /// A leaf key is absent
    #[error("The JSON response did not contain a '{field}' key")]
    MissingField { field: &'static str },

    /// A leaf key holds the wrong JSON type
    #[error("The JSON response did not contain a '{field}' key with a {expected} value")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },
}

/// Errors interpreting the push gateway response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Response too short to carry a status line
    #[error("Invalid response received from push gateway - read {received} bytes: {raw}")]
    InvalidResponse { received: usize, raw: String },

    /// Non-2xx status
    #[error("Error received from push gateway (status {status}): {detail}")]
    Rejected { status: String, detail: String },
}

/// Errors validating a [`Config`](crate::Config)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is missing or empty
    #[error("{0} was not set")]
    Missing(&'static str),

    /// A duration that must be positive was zero
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
