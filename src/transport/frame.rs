// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Length-prefixed framing for stream transports.
//!
//! ```text
//! [length:4, big-endian][message: JSON, `length` bytes]
//! ```

use std::io::{ErrorKind, Read, Write};

use crate::protocol::{Boundary, CommunicationError, Message, Response};

/// Largest accepted frame body.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

const LENGTH_PREFIX: usize = 4;

/// Read one frame. `Ok(None)` means the peer closed the stream cleanly
/// between frames.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, CommunicationError> {
    let mut prefix = [0u8; LENGTH_PREFIX];
    match reader.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(io_failure("read", e)),
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(CommunicationError::TransportFailure(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"
        )));
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .map_err(|e| io_failure("read", e))?;
    Ok(Some(body))
}

pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<(), CommunicationError> {
    if body.len() > MAX_FRAME_LEN {
        return Err(CommunicationError::TransportFailure(format!(
            "frame of {} bytes exceeds the {MAX_FRAME_LEN} byte limit",
            body.len()
        )));
    }

    // Bounded by MAX_FRAME_LEN above.
    let prefix = (body.len() as u32).to_be_bytes();
    writer
        .write_all(&prefix)
        .and_then(|()| writer.write_all(body))
        .and_then(|()| writer.flush())
        .map_err(|e| io_failure("write", e))
}

pub fn encode(message: &Message) -> Result<Vec<u8>, CommunicationError> {
    serde_json::to_vec(message).map_err(|e| CommunicationError::MalformedMessage(e.to_string()))
}

pub fn decode(body: &[u8]) -> Result<Message, CommunicationError> {
    serde_json::from_slice(body).map_err(|e| CommunicationError::MalformedMessage(e.to_string()))
}

pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<(), CommunicationError> {
    write_frame(writer, &encode(message)?)
}

/// Read one message, failing if the stream ends first.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message, CommunicationError> {
    let body = read_frame(reader)?.ok_or_else(|| {
        CommunicationError::TransportFailure("stream closed before a response arrived".to_string())
    })?;
    decode(&body)
}

/// Answer every frame on `stream` until the peer disconnects.
///
/// A frame that is not a valid message is answered with a failure response
/// carrying an empty id. Transport errors end the connection.
pub fn serve_connection<S: Read + Write>(
    mut stream: S,
    boundary: &Boundary,
) -> Result<(), CommunicationError> {
    while let Some(body) = read_frame(&mut stream)? {
        let reply = match decode(&body) {
            Ok(message) => boundary.handle(message),
            Err(e) => {
                tracing::warn!(error = %e, "Dropped malformed frame");
                Message::Response(Response::failure("", e.to_string()))
            }
        };
        write_message(&mut stream, &reply)?;
    }
    Ok(())
}

fn io_failure(action: &str, e: std::io::Error) -> CommunicationError {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            CommunicationError::TransportFailure(format!("{action} timed out"))
        }
        _ => CommunicationError::TransportFailure(format!("{action} failed: {e}")),
    }
}
