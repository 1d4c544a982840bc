//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload
//! - env_len (4 bytes) + envelope JSON + attachment (rest of payload)
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         JSON body           │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ShelfError};
use crate::state::UserId;

use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// JSON part of a request payload
#[derive(Debug, Default, Serialize, Deserialize)]
struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<UserId>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    body: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + env_len (4) + envelope + attachment
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let cmd_type = command.command_type() as u8;

    let (filename, attachment) = match command {
        Command::UploadAvatar { filename, data, .. } => (Some(filename.clone()), data.as_slice()),
        _ => (None, &[][..]),
    };
    let envelope = Envelope {
        user: command.user(),
        body: command.body().clone(),
        filename,
    };
    let envelope = serde_json::to_vec(&envelope)?;

    let payload_len = 4 + envelope.len() + attachment.len();
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(ShelfError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    // Build full message: header + payload
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload_len);
    message.put_u8(cmd_type);
    message.put_u32(payload_len as u32);
    message.put_u32(envelope.len() as u32);
    message.put_slice(&envelope);
    message.put_slice(attachment);

    Ok(message.to_vec())
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    if bytes.len() < HEADER_SIZE {
        return Err(ShelfError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    // Parse header
    let cmd_byte = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(ShelfError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(ShelfError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let cmd_type = CommandType::from_u8(cmd_byte).ok_or_else(|| {
        ShelfError::Protocol(format!("Unknown command type: 0x{:02x}", cmd_byte))
    })?;

    let payload = &bytes[HEADER_SIZE..total_len];
    let (envelope, attachment) = split_payload(payload)?;

    if cmd_type == CommandType::Ping {
        return Ok(Command::Ping);
    }

    let user = envelope
        .user
        .ok_or_else(|| ShelfError::Protocol("Missing user id".to_string()))?;
    let body = envelope.body;

    let command = match cmd_type {
        CommandType::GetState => Command::GetState { user },
        CommandType::SaveBook => Command::SaveBook { user, body },
        CommandType::DeleteBook => Command::DeleteBook { user, body },
        CommandType::SaveShelf => Command::SaveShelf { user, body },
        CommandType::DeleteShelf => Command::DeleteShelf { user, body },
        CommandType::AddShelfMembers => Command::AddShelfMembers { user, body },
        CommandType::Import => Command::Import { user, body },
        CommandType::UpdateProfile => Command::UpdateProfile { user, body },
        CommandType::UploadAvatar => Command::UploadAvatar {
            user,
            filename: envelope.filename.unwrap_or_default(),
            data: attachment.to_vec(),
        },
        CommandType::ResetAll => Command::ResetAll { user },
        CommandType::Ping => Command::Ping,
    };

    Ok(command)
}

/// Split a request payload into envelope and attachment
fn split_payload(payload: &[u8]) -> Result<(Envelope, &[u8])> {
    if payload.len() < 4 {
        return Err(ShelfError::Protocol(
            "Missing envelope length".to_string(),
        ));
    }

    let env_len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;

    if payload.len() < 4 + env_len {
        return Err(ShelfError::Protocol(format!(
            "Incomplete envelope (expected {}, got {})",
            env_len,
            payload.len() - 4
        )));
    }

    let envelope = if env_len == 0 {
        Envelope::default()
    } else {
        serde_json::from_slice(&payload[4..4 + env_len])
            .map_err(|e| ShelfError::Protocol(format!("Malformed envelope: {}", e)))?
    };

    Ok((envelope, &payload[4 + env_len..]))
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + JSON body
///
/// A body over `MAX_PAYLOAD_SIZE` is a `Serialization` error (500); nothing
/// is produced that a peer would reject.
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(&response.body)?;
    if body.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(ShelfError::Serialization(format!(
            "Response payload too large: {} bytes (max {})",
            body.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = BytesMut::with_capacity(HEADER_SIZE + body.len());
    message.put_u8(response.status as u8);
    message.put_u32(body.len() as u32);
    message.put_slice(&body);

    Ok(message.to_vec())
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    if bytes.len() < HEADER_SIZE {
        return Err(ShelfError::Protocol(format!(
            "Incomplete response header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    // Parse header
    let status_byte = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(ShelfError::Protocol(format!(
            "Response payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(ShelfError::Protocol(format!(
            "Incomplete response payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let status = Status::from_u8(status_byte).ok_or_else(|| {
        ShelfError::Protocol(format!("Unknown response status: 0x{:02x}", status_byte))
    })?;

    let body = if payload_len > 0 {
        serde_json::from_slice(&bytes[HEADER_SIZE..total_len])
            .map_err(|e| ShelfError::Protocol(format!("Malformed response body: {}", e)))?
    } else {
        Value::Null
    };

    Ok(Response { status, body })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one framed message (header + payload) from a stream
fn read_frame<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>> {
    // Read header first
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    // Parse payload length
    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(ShelfError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    // Combine header and payload
    let mut full_message = vec![0u8; HEADER_SIZE + payload_len];
    full_message[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut full_message[HEADER_SIZE..])?;
    }

    Ok(full_message)
}

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let frame = read_frame(reader, "Command")?;
    decode_command(&frame)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let frame = read_frame(reader, "Response")?;
    decode_response(&frame)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
