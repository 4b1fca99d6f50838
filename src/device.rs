// HS110 - smart plug wire protocol and metrics pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Device client
//!
//! One [`DeviceClient::query`] is one request frame out and one response
//! frame back on the client's stream. The stream stays open between
//! queries, so a poll tick issues both of its queries over one connection.

use crate::codec::{self, REQUEST_CAPACITY, RESPONSE_CAPACITY};
use crate::error::{DeviceError, Result};
use crate::transport::send_all;
use log::debug;
use serde_json::Value;
use std::io::{Read, Write};

/// Request for identity and relay state
pub const GET_SYSINFO: &str = r#"{"system":{"get_sysinfo":null}}"#;

/// Request for the energy meter's instantaneous readings
pub const GET_REALTIME: &str = r#"{"emeter":{"get_realtime":{}}}"#;

/// Client for the plug's request/response protocol
#[derive(Debug)]
pub struct DeviceClient<S> {
    stream: S,
}

impl<S: Read + Write> DeviceClient<S> {
    /// Wrap an already connected stream
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Send `request` and return the parsed JSON response.
    pub fn query(&mut self, request: &str) -> Result<Value> {
        let frame = codec::encode(request.as_bytes(), REQUEST_CAPACITY)?;
        send_all(&mut self.stream, &frame)?;

        let response = codec::read_frame(&mut self.stream, RESPONSE_CAPACITY)?;
        let plaintext = codec::decode(&response, RESPONSE_CAPACITY)?;
        debug!(
            "Device exchange: sent {} bytes, received {} bytes",
            frame.len(),
            response.len()
        );

        let document: Value = serde_json::from_slice(&plaintext)?;
        if document.is_null() {
            return Err(DeviceError::EmptyResponse.into());
        }
        Ok(document)
    }

    /// Query identity and relay state
    pub fn sys_info(&mut self) -> Result<Value> {
        self.query(GET_SYSINFO)
    }

    /// Query energy meter readings
    pub fn real_time(&mut self) -> Result<Value> {
        self.query(GET_REALTIME)
    }

    /// Give back the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }
}
