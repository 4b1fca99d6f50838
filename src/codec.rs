// HS110 - smart plug wire protocol and metrics pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Device wire codec
//!
//! The plug speaks JSON wrapped in a length-prefixed XOR autokey stream. It
//! hides the text from casual inspection and nothing more; the key is fixed
//! and public.
//!
//! # Frame Format
//!
//! ```text
//! [length: 4 BE] [obfuscated payload: length]
//!
//! encode: iv = 171; for p in payload { iv ^= p; emit iv }
//! decode: iv = 171; for c in body    { emit iv ^ c; iv = c }
//! ```
//!
//! Every frame starts again from the initial key, so frames are independent.

use crate::error::CodecError;
use std::io::{ErrorKind, Read};

/// Size of the big-endian length prefix
pub const HEADER_SIZE: usize = 4;

/// Initial value of the running key
pub const INITIAL_KEY: u8 = 171;

/// Maximum size of an encoded request frame
pub const REQUEST_CAPACITY: usize = 128;

/// Maximum plaintext size accepted from the device
pub const RESPONSE_CAPACITY: usize = 4096;

/// Encode `plaintext` into a frame no larger than `capacity` bytes.
pub fn encode(plaintext: &[u8], capacity: usize) -> Result<Vec<u8>, CodecError> {
    let needed = plaintext.len() + HEADER_SIZE;
    if needed > capacity {
        return Err(CodecError::BufferTooSmall {
            needed,
            available: capacity,
        });
    }
    let len = u32::try_from(plaintext.len()).map_err(|_| CodecError::BufferTooSmall {
        needed,
        available: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(needed);
    frame.extend_from_slice(&len.to_be_bytes());

    let mut iv = INITIAL_KEY;
    for &p in plaintext {
        iv ^= p;
        frame.push(iv);
    }
    Ok(frame)
}

/// Read the declared plaintext length from a frame header.
pub fn declared_len(frame: &[u8]) -> Result<usize, CodecError> {
    if frame.len() < HEADER_SIZE {
        return Err(CodecError::TooShort {
            received: frame.len(),
        });
    }
    Ok(u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize)
}

/// Decode a complete frame whose payload may not exceed `capacity` bytes.
///
/// The body must carry exactly the declared number of bytes. A body that is
/// shorter or longer is rejected with [`CodecError::LengthMismatch`] rather
/// than decoded on a best-effort basis.
pub fn decode(frame: &[u8], capacity: usize) -> Result<Vec<u8>, CodecError> {
    let declared = declared_len(frame)?;
    if declared > capacity {
        return Err(CodecError::BufferTooSmall {
            needed: declared,
            available: capacity,
        });
    }

    let body = &frame[HEADER_SIZE..];
    if body.len() != declared {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: body.len(),
        });
    }

    let mut plaintext = Vec::with_capacity(declared);
    let mut iv = INITIAL_KEY;
    for &c in body {
        plaintext.push(iv ^ c);
        iv = c;
    }
    Ok(plaintext)
}

/// Read one complete frame from `reader`.
///
/// Reads are repeated until the header and the declared body have arrived,
/// so a response split across TCP segments is reassembled. The declared
/// length is checked against `capacity` before any body byte is read.
pub fn read_frame<R: Read>(reader: &mut R, capacity: usize) -> crate::Result<Vec<u8>> {
    let mut frame = vec![0u8; HEADER_SIZE];
    let received = fill(reader, &mut frame)?;
    if received < HEADER_SIZE {
        return Err(CodecError::TooShort { received }.into());
    }

    let declared = declared_len(&frame)?;
    if declared > capacity {
        return Err(CodecError::BufferTooSmall {
            needed: declared,
            available: capacity,
        }
        .into());
    }

    frame.resize(HEADER_SIZE + declared, 0);
    let received = fill(reader, &mut frame[HEADER_SIZE..])?;
    if received < declared {
        return Err(CodecError::Truncated {
            expected: declared,
            received,
        }
        .into());
    }
    Ok(frame)
}

/// Read until `buf` is full or the peer closes. Returns the bytes read.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
