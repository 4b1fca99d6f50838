// HS110 - smart plug wire protocol and metrics pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus text exposition for plug telemetry.
//!
//! Every series is a gauge labelled with the device tag string. The body is
//! built by hand: label values are passed through unescaped, exactly as the
//! device reported them.

use crate::telemetry::{RealTime, SysInfo};
use std::fmt::Write;

/// Names of the published gauges, in body order.
pub const METRIC_NAMES: [&str; 6] = [
    "state",
    "on_time",
    "voltage_mv",
    "current_ma",
    "power_mw",
    "total_wh",
];

/// One gauge sample with its display precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gauge {
    pub name: &'static str,
    pub value: f64,
    pub decimals: usize,
}

/// Gauges for one tick, in [`METRIC_NAMES`] order.
pub fn gauges(sys_info: &SysInfo<'_>, real_time: &RealTime) -> [Gauge; 6] {
    let gauge = |name, value, decimals| Gauge {
        name,
        value,
        decimals,
    };
    [
        gauge(METRIC_NAMES[0], sys_info.state, 0),
        gauge(METRIC_NAMES[1], sys_info.on_time_seconds, 3),
        gauge(METRIC_NAMES[2], real_time.voltage_mv, 3),
        gauge(METRIC_NAMES[3], real_time.current_ma, 3),
        gauge(METRIC_NAMES[4], real_time.power_mw, 3),
        gauge(METRIC_NAMES[5], real_time.total_wh, 3),
    ]
}

/// Encode gauges to Prometheus text format.
pub fn encode_gauges(tags: &str, gauges: &[Gauge]) -> String {
    let mut body = String::new();
    for g in gauges {
        // Writing to a String cannot fail.
        let _ = writeln!(body, "# TYPE {} gauge", g.name);
        let _ = writeln!(
            body,
            "{}{{{}}} {:.*}",
            g.name, tags, g.decimals, g.value
        );
    }
    body
}

/// Encode a full tick of telemetry.
pub fn encode_metrics(tags: &str, sys_info: &SysInfo<'_>, real_time: &RealTime) -> String {
    encode_gauges(tags, &gauges(sys_info, real_time))
}
