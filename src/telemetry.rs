//! Telemetry extraction from device JSON
//!
//! Both records are read with the same walk: the root must be an object,
//! a fixed chain of object-valued keys leads to a leaf object, and each
//! field of the leaf is read with a required JSON type. The first problem
//! aborts the whole record; there are no partial results.

use crate::error::ExtractError;
use serde_json::{Map, Value};

/// Identity and relay state, borrowed from the parsed sys-info document
#[derive(Debug, Clone, PartialEq)]
pub struct SysInfo<'a> {
    /// User-assigned name
    pub alias: &'a str,
    /// Device identifier (`deviceId`)
    pub id: &'a str,
    /// MAC address as reported by the device
    pub mac: &'a str,
    /// Relay state, 0 or 1 (`relay_state`)
    pub state: f64,
    /// Seconds since the relay was switched on (`on_time`)
    pub on_time_seconds: f64,
}

impl SysInfo<'_> {
    /// Label fragment identifying the device in published metrics.
    ///
    /// Values are inserted verbatim, without escaping.
    pub fn tags(&self) -> String {
        format!(
            "alias=\"{}\",id=\"{}\",mac=\"{}\"",
            self.alias, self.id, self.mac
        )
    }
}

/// Instantaneous energy meter readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealTime {
    pub voltage_mv: f64,
    pub current_ma: f64,
    pub power_mw: f64,
    pub total_wh: f64,
}

/// Extract [`SysInfo`] from a `system.get_sysinfo` response.
pub fn extract_sys_info(document: &Value) -> Result<SysInfo<'_>, ExtractError> {
    let leaf = descend(document, "Sys Info", &["system", "get_sysinfo"])?;
    Ok(SysInfo {
        alias: string_field(leaf, "alias")?,
        id: string_field(leaf, "deviceId")?,
        mac: string_field(leaf, "mac")?,
        state: number_field(leaf, "relay_state")?,
        on_time_seconds: number_field(leaf, "on_time")?,
    })
}

/// Extract [`RealTime`] from an `emeter.get_realtime` response.
pub fn extract_real_time(document: &Value) -> Result<RealTime, ExtractError> {
    let leaf = descend(document, "Real Time Info", &["emeter", "get_realtime"])?;
    Ok(RealTime {
        voltage_mv: number_field(leaf, "voltage_mv")?,
        current_ma: number_field(leaf, "current_ma")?,
        power_mw: number_field(leaf, "power_mw")?,
        total_wh: number_field(leaf, "total_wh")?,
    })
}

fn descend<'a>(
    document: &'a Value,
    record: &'static str,
    path: &[&'static str],
) -> Result<&'a Map<String, Value>, ExtractError> {
    let mut object = document
        .as_object()
        .ok_or(ExtractError::NotAnObject { record })?;
    for &key in path {
        object = object
            .get(key)
            .and_then(Value::as_object)
            .ok_or(ExtractError::MissingObject { key })?;
    }
    Ok(object)
}

fn string_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ExtractError> {
    object
        .get(field)
        .ok_or(ExtractError::MissingField { field })?
        .as_str()
        .ok_or(ExtractError::TypeMismatch {
            field,
            expected: "string",
        })
}

fn number_field(object: &Map<String, Value>, field: &'static str) -> Result<f64, ExtractError> {
    object
        .get(field)
        .ok_or(ExtractError::MissingField { field })?
        .as_f64()
        .ok_or(ExtractError::TypeMismatch {
            field,
            expected: "numeric",
        })
}
