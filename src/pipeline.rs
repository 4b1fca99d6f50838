// HS110 - smart plug wire protocol and metrics pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Poll tick orchestration
//!
//! A tick walks a fixed sequence of stages over a single device connection:
//!
//! ```text
//! Connecting -> QuerySysInfo -> ExtractSysInfo -> QueryRealTime -> ExtractRealTime -> Publish
//!      \              \               \                \                 \
//!       +--------------+---------------+----------------+-----------------+--> Abandoned
//! ```
//!
//! An abandoned tick deletes the metric group at the gateway so that an
//! unreachable or misbehaving plug does not leave stale series behind. A
//! tick that reaches `Publish` registers the new values; a failed publish is
//! logged and the tick still counts as completed.

use crate::config::Config;
use crate::device::DeviceClient;
use crate::error::{Error, ExtractError, Result};
use crate::gateway::{MetricsSink, PushGateway};
use crate::shutdown::Shutdown;
use crate::telemetry::{extract_real_time, extract_sys_info, RealTime, SysInfo};
use crate::transport::Connection;
use log::{debug, error, info};
use serde_json::Value;
use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

/// Stages of a poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickStage {
    Connecting,
    QuerySysInfo,
    ExtractSysInfo,
    QueryRealTime,
    ExtractRealTime,
    Publish,
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TickStage::Connecting => "connecting",
            TickStage::QuerySysInfo => "querying sys info",
            TickStage::ExtractSysInfo => "extracting sys info",
            TickStage::QueryRealTime => "querying real time info",
            TickStage::ExtractRealTime => "extracting real time info",
            TickStage::Publish => "publishing",
        };
        f.write_str(name)
    }
}

/// How a tick ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Telemetry reached the registration call (which may itself have failed)
    Published,
    /// The tick failed at `stage` and the metric group was deleted
    Abandoned { stage: TickStage },
}

/// Source of device connections, one per tick.
pub trait Connector {
    type Stream: Read + Write;

    /// Open a connection to the device
    fn connect(&self) -> Result<Self::Stream>;

    /// Release a connection once the tick is done with it
    fn disconnect(&self, stream: Self::Stream);

    /// Device location for log messages
    fn describe(&self) -> String;
}

/// TCP connector for a configured plug
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.device_host.clone(),
            port: config.device_port,
            timeout: config.io_timeout,
        }
    }
}

impl Connector for TcpConnector {
    type Stream = Connection;

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.host, self.port, self.timeout)
    }

    fn disconnect(&self, stream: Connection) {
        stream.close();
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Runs poll ticks against one device and one metrics sink
#[derive(Debug)]
pub struct Pipeline<C, S> {
    connector: C,
    sink: S,
    poll_interval: Duration,
}

impl Pipeline<TcpConnector, PushGateway> {
    /// Build the production pipeline from a configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            TcpConnector::from_config(config),
            PushGateway::from_config(config),
            config.poll_interval,
        )
    }
}

impl<C: Connector, S: MetricsSink> Pipeline<C, S> {
    pub fn new(connector: C, sink: S, poll_interval: Duration) -> Self {
        Self {
            connector,
            sink,
            poll_interval,
        }
    }

    /// The sink metrics are published to
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run one poll tick to completion.
    pub fn tick(&self) -> TickOutcome {
        let stream = match self.connector.connect() {
            Ok(stream) => stream,
            Err(e) => {
                error!(
                    "Abandoning connection attempts to {}: {}",
                    self.connector.describe(),
                    e
                );
                return self.abandon(TickStage::Connecting);
            }
        };

        let mut sys_info_doc = None;
        let mut real_time_doc = None;
        let mut client = DeviceClient::new(stream);
        let collected = collect(&mut client, &mut sys_info_doc, &mut real_time_doc);
        self.connector.disconnect(client.into_inner());

        let (sys_info, real_time) = match collected {
            Ok(records) => records,
            Err((stage, e)) => {
                error!(
                    "Failed while {} for {}: {}",
                    stage,
                    self.connector.describe(),
                    e
                );
                return self.abandon(stage);
            }
        };

        let tags = sys_info.tags();
        match self.sink.register(&tags, &sys_info, &real_time) {
            Ok(()) => debug!("Published metrics for {}", self.connector.describe()),
            Err(e) => error!("Failed while {}: {}", TickStage::Publish, e),
        }
        TickOutcome::Published
    }

    fn abandon(&self, stage: TickStage) -> TickOutcome {
        if let Err(e) = self.sink.delete() {
            error!("Could not delete metrics: {}", e);
        }
        TickOutcome::Abandoned { stage }
    }

    /// Tick until `shutdown` is triggered. Returns the number of ticks run.
    ///
    /// Shutdown is observed before each tick and during the wait after it;
    /// a running tick is never interrupted.
    pub fn run(&self, shutdown: &Shutdown) -> u64 {
        let mut ticks = 0;
        while !shutdown.is_triggered() {
            let outcome = self.tick();
            ticks += 1;
            debug!("Tick {} finished: {:?}", ticks, outcome);
            if shutdown.wait_timeout(self.poll_interval) {
                break;
            }
        }
        info!("Poll loop stopped after {} tick(s)", ticks);
        ticks
    }
}

/// Query and extract both records. The parsed documents are parked in the
/// caller's slots so the extracted strings can outlive the device client.
fn collect<'d, T: Read + Write>(
    client: &mut DeviceClient<T>,
    sys_info_slot: &'d mut Option<Value>,
    real_time_slot: &'d mut Option<Value>,
) -> std::result::Result<(SysInfo<'d>, RealTime), (TickStage, Error)> {
    let at = |stage: TickStage| move |e: Error| (stage, e);
    let extract_at = |stage: TickStage| move |e: ExtractError| (stage, Error::from(e));

    let sys_info_doc = client.sys_info().map_err(at(TickStage::QuerySysInfo))?;
    let sys_info_doc: &'d Value = sys_info_slot.insert(sys_info_doc);
    let sys_info = extract_sys_info(sys_info_doc).map_err(extract_at(TickStage::ExtractSysInfo))?;

    let real_time_doc = client.real_time().map_err(at(TickStage::QueryRealTime))?;
    let real_time_doc: &'d Value = real_time_slot.insert(real_time_doc);
    let real_time =
        extract_real_time(real_time_doc).map_err(extract_at(TickStage::ExtractRealTime))?;

    Ok((sys_info, real_time))
}
