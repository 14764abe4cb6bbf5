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
//! ### Payload by Command Type
//! - GET:    if_none_match (8) + key_len (4) + key
//! - PUT:    if_match (8) + key_len (4) + key + value
//! - DELETE: key_len (4) + key
//! - PING:   empty
//! - FIND:   prefix (rest of payload)
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! All integers are big-endian.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use super::{Command, CommandType, Response, Status};
use crate::error::{KvError, Result};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut payload = BytesMut::new();
    match command {
        Command::Get { key, if_none_match } => {
            payload.put_u64(*if_none_match);
            put_key(&mut payload, key);
        }
        Command::Put {
            key,
            value,
            if_match,
        } => {
            payload.put_u64(*if_match);
            put_key(&mut payload, key);
            payload.put_slice(value);
        }
        Command::Delete { key } => put_key(&mut payload, key),
        Command::Ping => {}
        Command::Find { prefix } => payload.put_slice(prefix),
    }

    frame(command.command_type() as u8, &payload)
}

/// Decode a complete command frame
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_byte, payload) = split_frame(bytes, "command")?;
    let cmd_type = CommandType::from_byte(cmd_byte).ok_or_else(|| {
        KvError::Protocol(format!("Unknown command type: 0x{:02x}", cmd_byte))
    })?;

    let mut buf = payload;
    match cmd_type {
        CommandType::Get => {
            let if_none_match = take_u64(&mut buf, "GET")?;
            let key = take_key(&mut buf, "GET")?;
            expect_consumed(buf, "GET")?;
            Ok(Command::Get { key, if_none_match })
        }
        CommandType::Put => {
            let if_match = take_u64(&mut buf, "PUT")?;
            let key = take_key(&mut buf, "PUT")?;
            Ok(Command::Put {
                key,
                value: buf.to_vec(),
                if_match,
            })
        }
        CommandType::Delete => {
            let key = take_key(&mut buf, "DELETE")?;
            expect_consumed(buf, "DELETE")?;
            Ok(Command::Delete { key })
        }
        CommandType::Ping => {
            expect_consumed(buf, "PING")?;
            Ok(Command::Ping)
        }
        CommandType::Find => Ok(Command::Find {
            prefix: buf.to_vec(),
        }),
    }
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Vec<u8> {
    frame(response.status as u8, response.payload.as_deref().unwrap_or(&[]))
}

/// Decode a complete response frame
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response")?;
    let status = Status::from_byte(status_byte).ok_or_else(|| {
        KvError::Protocol(format!("Unknown response status: 0x{:02x}", status_byte))
    })?;

    Ok(Response {
        status,
        payload: if payload.is_empty() {
            None
        } else {
            Some(payload.to_vec())
        },
    })
}

/// Parse an entry payload: `(version, last_modified, value)`
pub fn decode_entry(payload: &[u8]) -> Result<(u64, i64, Vec<u8>)> {
    let mut buf = payload;
    let version = take_u64(&mut buf, "entry")?;
    let last_modified = take_u64(&mut buf, "entry")? as i64;
    Ok((version, last_modified, buf.to_vec()))
}

/// Parse a NO_CONTENT payload carrying an entity tag
pub fn decode_version_tag(payload: &[u8]) -> Result<u64> {
    let mut buf = payload;
    let version = take_u64(&mut buf, "version tag")?;
    expect_consumed(buf, "version tag")?;
    Ok(version)
}

/// Parse a key list payload
pub fn decode_keys(payload: &[u8]) -> Result<Vec<String>> {
    let mut buf = payload;
    let mut keys = Vec::new();
    while buf.has_remaining() {
        let raw = take_key(&mut buf, "key list")?;
        let key = String::from_utf8(raw)
            .map_err(|_| KvError::Protocol("key list: key is not UTF-8".to_string()))?;
        keys.push(key);
    }
    Ok(keys)
}

// =============================================================================
// Framing helpers
// =============================================================================

fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(tag);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    message.to_vec()
}

fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(KvError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let tag = header.get_u8();
    let payload_len = header.get_u32();
    check_payload_len(payload_len)?;

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(KvError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((tag, &bytes[HEADER_SIZE..total_len]))
}

fn check_payload_len(len: u32) -> Result<()> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(KvError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn put_key(buf: &mut BytesMut, key: &[u8]) {
    buf.put_u32(key.len() as u32);
    buf.put_slice(key);
}

fn take_u64(buf: &mut &[u8], what: &str) -> Result<u64> {
    if buf.remaining() < 8 {
        return Err(KvError::Protocol(format!("{}: missing version field", what)));
    }
    Ok(buf.get_u64())
}

fn take_key(buf: &mut &[u8], what: &str) -> Result<Vec<u8>> {
    if buf.remaining() < 4 {
        return Err(KvError::Protocol(format!("{}: missing key length", what)));
    }
    let key_len = buf.get_u32() as usize;
    if buf.remaining() < key_len {
        return Err(KvError::Protocol(format!(
            "{}: incomplete key (expected {}, got {})",
            what,
            key_len,
            buf.remaining()
        )));
    }
    let key = (*buf)[..key_len].to_vec();
    buf.advance(key_len);
    Ok(key)
}

fn expect_consumed(buf: &[u8], what: &str) -> Result<()> {
    if !buf.is_empty() {
        return Err(KvError::Protocol(format!(
            "{}: unexpected {} trailing bytes",
            what,
            buf.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one frame (header + payload) from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    check_payload_len(payload_len)?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len as usize];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;
    Ok(message)
}

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    decode_command(&read_frame(reader)?)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    decode_response(&read_frame(reader)?)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}
