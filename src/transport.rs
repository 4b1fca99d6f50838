// HS110 - smart plug wire protocol and metrics pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Blocking TCP transport
//!
//! A [`Connection`] is opened per exchange and closed right after it. There
//! is no pooling and no retry: a failed open is reported to the caller and
//! the next poll tick is the retry.

use crate::error::{Result, TransportError};
use log::{debug, warn};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// An open TCP connection to a device or push gateway
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    /// Resolve `host:port` and connect to the first address that accepts.
    ///
    /// Candidates are tried in resolution order. With a `timeout`, it bounds
    /// the connect attempt and every later read and write; without one (or
    /// with a zero one), all socket calls block indefinitely.
    pub fn open(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self> {
        let target = format!("{}:{}", host, port);
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                target: target.clone(),
                source,
            })?
            .collect();

        for addr in &addrs {
            match connect(addr, timeout) {
                Ok(stream) => {
                    debug!("Connected to {} via {}", target, addr);
                    return Ok(Self { stream, peer: *addr });
                }
                Err(e) => warn!("Could not connect to {} ({}): {}", target, addr, e),
            }
        }

        Err(TransportError::Connect {
            target,
            attempts: addrs.len(),
        }
        .into())
    }

    /// Address of the connected peer
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Shut down both directions and release the socket.
    pub fn close(self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            // Peer may already have closed; the socket is released regardless.
            debug!("Shutdown of connection to {} failed: {}", self.peer, e);
        }
    }
}

fn connect(addr: &SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    // Sockets reject a zero timeout; treat it as no timeout
    let timeout = timeout.filter(|t| !t.is_zero());
    let stream = match timeout {
        Some(t) => TcpStream::connect_timeout(addr, t)?,
        None => TcpStream::connect(addr)?,
    };
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    Ok(stream)
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Write `data` with a single call and fail if it was not fully accepted.
///
/// Partial writes are not retried; a short write aborts the exchange.
pub fn send_all<W: Write>(writer: &mut W, data: &[u8]) -> Result<()> {
    let written = writer.write(data).map_err(TransportError::Io)?;
    if written != data.len() {
        return Err(TransportError::ShortWrite {
            written,
            expected: data.len(),
        }
        .into());
    }
    Ok(())
}
