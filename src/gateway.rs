// HS110 - smart plug wire protocol and metrics pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Push gateway publisher
//!
//! The [`PushGateway`] speaks just enough HTTP/1.0 to register a metric
//! group (POST) or delete it (DELETE). Each call opens its own connection,
//! writes the request, reads the start of the response and closes.
//!
//! # Exchange
//!
//! ```text
//! POST /metrics/job/hs110 HTTP/1.0          DELETE /metrics/job/hs110 HTTP/1.0
//! Host: pushgateway                         Host: pushgateway
//! Content-Length: 312                       Content-Length: 0
//! Content-Type: text/plain
//!                                           <no body>
//! # TYPE state gauge ...
//!
//! HTTP/1.0 200 OK            -> success (first status digit at offset 9 is '2')
//! HTTP/1.0 400 Bad Request   -> GatewayError::Rejected, body after the blank line
//! ```
//!
//! Responses are not parsed as general HTTP: no header interpretation, no
//! chunked bodies, no keep-alive.

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::exposition::encode_metrics;
use crate::telemetry::{RealTime, SysInfo};
use crate::transport::{send_all, Connection};
use log::debug;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Maximum number of response bytes inspected
pub const RESPONSE_BUFFER_SIZE: usize = 256;

/// Shortest response that can carry a status code
pub const MIN_RESPONSE_LEN: usize = 10;

/// Byte offset of the first status digit in `HTTP/1.x NNN`
pub const STATUS_OFFSET: usize = 9;

/// Marker logged when a response has no header/body separator
pub const NO_BODY_MARKER: &str = "N/A";

/// Destination for one tick's metrics.
pub trait MetricsSink {
    /// Publish the telemetry of a successful tick under `tags`.
    fn register(&self, tags: &str, sys_info: &SysInfo<'_>, real_time: &RealTime) -> Result<()>;

    /// Remove the published metric group.
    fn delete(&self) -> Result<()>;
}

/// HTTP method used against the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Post => write!(f, "POST"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// A fully rendered gateway request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    pub header: String,
    pub body: Option<String>,
}

impl GatewayRequest {
    /// POST carrying a text exposition body
    pub fn register(endpoint: &str, host: &str, body: String) -> Self {
        let header = format!(
            "{} {} HTTP/1.0\r\nHost: {}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n",
            Method::Post,
            endpoint,
            host,
            body.len()
        );
        Self {
            header,
            body: Some(body),
        }
    }

    /// DELETE of the whole metric group
    pub fn delete(endpoint: &str, host: &str) -> Self {
        let header = format!(
            "{} {} HTTP/1.0\r\nHost: {}\r\nContent-Length: 0\r\n\r\n",
            Method::Delete,
            endpoint,
            host
        );
        Self { header, body: None }
    }

    /// Write header then body, each with one checked write.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        send_all(writer, self.header.as_bytes())?;
        if let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) {
            send_all(writer, body.as_bytes())?;
        }
        Ok(())
    }
}

/// Position within the response while splitting it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    StatusLine,
    Headers,
    Body(usize),
}

/// The parts of a gateway response this client looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    /// Status code text starting at [`STATUS_OFFSET`]
    pub status: String,
    /// Everything after the first blank line, if there is one
    pub body: Option<String>,
}

impl GatewayResponse {
    /// Split a raw response into status code and body.
    pub fn parse(raw: &[u8]) -> std::result::Result<Self, GatewayError> {
        let text = String::from_utf8_lossy(raw);
        if raw.len() < MIN_RESPONSE_LEN {
            return Err(GatewayError::InvalidResponse {
                received: raw.len(),
                raw: text.into_owned(),
            });
        }

        let status: String = raw[STATUS_OFFSET..]
            .iter()
            .take(3)
            .take_while(|b| b.is_ascii_digit())
            .map(|&b| b as char)
            .collect();
        let status = if status.is_empty() {
            (raw[STATUS_OFFSET] as char).to_string()
        } else {
            status
        };

        let mut state = ParseState::StatusLine;
        let mut offset = 0;
        while let ParseState::StatusLine | ParseState::Headers = state {
            let Some(end) = find_crlf(&raw[offset..]) else {
                break;
            };
            let line_is_empty = end == 0;
            offset += end + 2;
            state = match state {
                ParseState::StatusLine => ParseState::Headers,
                ParseState::Headers if line_is_empty => ParseState::Body(offset),
                other => other,
            };
        }

        let body = match state {
            ParseState::Body(start) => Some(String::from_utf8_lossy(&raw[start..]).into_owned()),
            _ => None,
        };
        Ok(Self { status, body })
    }

    /// Whether the gateway accepted the request
    pub fn is_success(&self) -> bool {
        self.status.starts_with('2')
    }

    /// Turn a non-2xx response into [`GatewayError::Rejected`].
    pub fn into_result(self) -> std::result::Result<(), GatewayError> {
        if self.is_success() {
            return Ok(());
        }
        Err(GatewayError::Rejected {
            status: self.status,
            detail: self.body.unwrap_or_else(|| NO_BODY_MARKER.to_string()),
        })
    }
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\r\n")
}

/// Read one response chunk of at most [`RESPONSE_BUFFER_SIZE`] bytes.
///
/// Does not wait for end of stream, so a gateway that keeps the connection
/// open after replying does not stall the publish.
pub fn read_response<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut buf = [0u8; RESPONSE_BUFFER_SIZE];
    let n = loop {
        match reader.read(&mut buf) {
            Ok(n) => break n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    };
    Ok(buf[..n].to_vec())
}

/// Publisher for a Prometheus push gateway endpoint
#[derive(Debug, Clone)]
pub struct PushGateway {
    host: String,
    port: u16,
    endpoint: String,
    timeout: Option<Duration>,
}

impl PushGateway {
    /// Create a publisher for `http://host:port{endpoint}`
    pub fn new(host: impl Into<String>, port: u16, endpoint: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            endpoint: endpoint.into(),
            timeout: None,
        }
    }

    /// Create a publisher from the gateway part of a [`Config`]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.gateway_host.clone(),
            config.gateway_port,
            config.gateway_endpoint.clone(),
        )
        .with_timeout(config.io_timeout)
    }

    /// Bound socket calls by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Gateway host name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Endpoint path
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one request over a fresh connection and check the response.
    pub fn send(&self, request: &GatewayRequest) -> Result<GatewayResponse> {
        let mut conn = Connection::open(&self.host, self.port, self.timeout)?;
        let raw = request
            .write_to(&mut conn)
            .and_then(|()| read_response(&mut conn));
        conn.close();
        let raw = raw?;

        debug!(
            "Push gateway {}:{} answered with {} bytes",
            self.host,
            self.port,
            raw.len()
        );
        let response = GatewayResponse::parse(&raw)?;
        response.clone().into_result()?;
        Ok(response)
    }
}

impl MetricsSink for PushGateway {
    fn register(&self, tags: &str, sys_info: &SysInfo<'_>, real_time: &RealTime) -> Result<()> {
        let body = encode_metrics(tags, sys_info, real_time);
        let request = GatewayRequest::register(&self.endpoint, &self.host, body);
        self.send(&request).map(|_| ())
    }

    fn delete(&self) -> Result<()> {
        let request = GatewayRequest::delete(&self.endpoint, &self.host);
        self.send(&request).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, TransportError};
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_register_request() {
        let request = GatewayRequest::register("/metrics/job/plug", "gw.local", "abc\n".to_string());
        assert_eq!(
            request.header,
            "POST /metrics/job/plug HTTP/1.0\r\nHost: gw.local\r\nContent-Length: 4\r\nContent-Type: text/plain\r\n\r\n"
        );
        assert_eq!(request.body.as_deref(), Some("abc\n"));
    }

    #[test]
    fn test_content_length_counts_bytes() {
        let request = GatewayRequest::register("/m", "h", "état\n".to_string());
        assert!(request.header.contains("Content-Length: 6\r\n"));
    }

    #[test]
    fn test_delete_request() {
        let request = GatewayRequest::delete("/metrics/job/plug", "gw.local");
        assert_eq!(
            request.header,
            "DELETE /metrics/job/plug HTTP/1.0\r\nHost: gw.local\r\nContent-Length: 0\r\n\r\n"
        );
        assert!(request.body.is_none());
    }

    #[test]
    fn test_write_to_concatenates() {
        let request = GatewayRequest::register("/m", "h", "x 1\n".to_string());
        let mut out = Vec::new();
        request.write_to(&mut out).unwrap();
        assert!(out.ends_with(b"\r\n\r\nx 1\n"));
    }

    #[test]
    fn test_parse_success() {
        let response = GatewayResponse::parse(b"HTTP/1.0 200 OK\r\nDate: now\r\n\r\n").unwrap();
        assert_eq!(response.status, "200");
        assert!(response.is_success());
        assert_eq!(response.body.as_deref(), Some(""));
        assert!(response.into_result().is_ok());
    }

    #[test]
    fn test_parse_accepted() {
        let response = GatewayResponse::parse(b"HTTP/1.1 202 Accepted\r\n\r\n").unwrap();
        assert!(response.is_success());
    }

    #[test]
    fn test_parse_bad_request() {
        let raw = b"HTTP/1.0 400 Bad Request\r\nContent-Type: text/plain\r\n\r\ntext format parsing error in line 2\n";
        let response = GatewayResponse::parse(raw).unwrap();
        assert_eq!(response.status, "400");
        assert_eq!(
            response.into_result(),
            Err(GatewayError::Rejected {
                status: "400".to_string(),
                detail: "text format parsing error in line 2\n".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_missing_separator() {
        let response = GatewayResponse::parse(b"HTTP/1.0 500 Internal Server Error\r\nX: y").unwrap();
        assert!(response.body.is_none());
        assert_eq!(
            response.into_result(),
            Err(GatewayError::Rejected {
                status: "500".to_string(),
                detail: NO_BODY_MARKER.to_string(),
            })
        );
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(
            GatewayResponse::parse(b"HTTP/1.0"),
            Err(GatewayError::InvalidResponse {
                received: 8,
                raw: "HTTP/1.0".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_nonstandard_status_line() {
        // Only offset 9 is looked at, whatever the status line says
        let response = GatewayResponse::parse(b"HTTP/2 200 OK\r\n\r\n").unwrap();
        assert_eq!(response.status, "0");
        assert!(!response.is_success());
    }

    #[test]
    fn test_read_response_caps_size() {
        let mut reader = Cursor::new(vec![b'a'; 1000]);
        assert_eq!(read_response(&mut reader).unwrap().len(), RESPONSE_BUFFER_SIZE);
    }

    #[test]
    fn test_read_response_single_chunk() {
        // Only the first chunk is taken
        let mut reader =
            Cursor::new(b"HTTP/1.0 200 OK\r\n\r\n".to_vec()).chain(Cursor::new(b"later".to_vec()));
        assert_eq!(read_response(&mut reader).unwrap(), b"HTTP/1.0 200 OK\r\n\r\n");
    }

    fn serve_once(reply: &'static [u8]) -> (u16, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // Read until the header terminator and the announced body are in.
            loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            stream.write_all(reply).unwrap();
            request
        });
        (port, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let length: usize = text[..split]
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        text.len() >= split + 4 + length
    }

    #[test]
    fn test_delete_over_tcp() {
        let (port, server) = serve_once(b"HTTP/1.0 202 Accepted\r\n\r\n");
        let gateway = PushGateway::new("127.0.0.1", port, "/metrics/job/hs110");
        gateway.delete().unwrap();
        let request = server.join().unwrap();
        assert_eq!(
            request,
            b"DELETE /metrics/job/hs110 HTTP/1.0\r\nHost: 127.0.0.1\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[test]
    fn test_register_rejected_over_tcp() {
        let (port, server) =
            serve_once(b"HTTP/1.0 400 Bad Request\r\nContent-Length: 9\r\n\r\nbad label");
        let gateway = PushGateway::new("127.0.0.1", port, "/metrics/job/hs110");
        let sys = SysInfo {
            alias: "a",
            id: "b",
            mac: "c",
            state: 0.0,
            on_time_seconds: 0.0,
        };
        let rt = RealTime {
            voltage_mv: 1.0,
            current_ma: 2.0,
            power_mw: 3.0,
            total_wh: 4.0,
        };
        let err = gateway.register(&sys.tags(), &sys, &rt).unwrap_err();
        assert!(matches!(
            err,
            Error::Gateway(GatewayError::Rejected { ref detail, .. }) if detail == "bad label"
        ));
        let request = String::from_utf8(server.join().unwrap()).unwrap();
        assert!(request.starts_with("POST /metrics/job/hs110 HTTP/1.0\r\n"));
        assert!(request.contains("state{alias=\"a\",id=\"b\",mac=\"c\"} 0\n"));
    }

    #[test]
    fn test_delete_with_gateway_holding_connection_open() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request_complete(&request) {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(b"HTTP/1.0 200 OK\r\n\r\n").unwrap();
            // Keep the socket open until the client is finished
            let _ = done_rx.recv_timeout(Duration::from_secs(10));
        });

        let gateway = PushGateway::new("127.0.0.1", port, "/metrics/job/hs110")
            .with_timeout(Some(Duration::from_secs(5)));
        let result = gateway.delete();
        done_tx.send(()).unwrap();
        server.join().unwrap();
        assert!(result.is_ok(), "{:?}", result);
    }

    #[test]
    fn test_gateway_unreachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = PushGateway::new("127.0.0.1", port, "/m").delete().unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Connect { .. })
        ));
    }
}
