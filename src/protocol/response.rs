//! Response definitions
//!
//! Represents responses to clients. Status codes mirror HTTP conditional
//! request semantics.

use bytes::{BufMut, BytesMut};

use crate::store::{StoreError, VersionedRecord};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    NoContent = 0x03,
    NotModified = 0x04,
    Conflict = 0x05,
    Gone = 0x06,
    BadRequest = 0x07,
    TooLarge = 0x08,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Status::Ok),
            0x01 => Some(Status::NotFound),
            0x02 => Some(Status::Error),
            0x03 => Some(Status::NoContent),
            0x04 => Some(Status::NotModified),
            0x05 => Some(Status::Conflict),
            0x06 => Some(Status::Gone),
            0x07 => Some(Status::BadRequest),
            0x08 => Some(Status::TooLarge),
            _ => None,
        }
    }

    /// Equivalent HTTP status code
    pub fn http_code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NoContent => 204,
            Status::NotModified => 304,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::Conflict => 409,
            Status::Gone => 410,
            Status::TooLarge => 413,
            Status::Error => 500,
        }
    }
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,

    /// Status-specific payload (see the codec docs)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// OK with an optional payload
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    /// OK carrying a full entry: `version u64 | last_modified i64 | value`
    pub fn entry(record: &VersionedRecord) -> Self {
        let mut buf = BytesMut::with_capacity(16 + record.payload.len());
        buf.put_u64(record.version);
        buf.put_i64(record.last_modified);
        buf.put_slice(&record.payload);
        Self::ok(Some(buf.to_vec()))
    }

    /// OK carrying a key list: repeated `key_len u32 | key`
    pub fn keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut buf = BytesMut::new();
        for key in keys {
            buf.put_u32(key.len() as u32);
            buf.put_slice(key.as_bytes());
        }
        Self::ok(Some(buf.to_vec()))
    }

    /// NO_CONTENT, optionally carrying the new entity tag
    pub fn no_content(version: Option<u64>) -> Self {
        Self {
            status: Status::NoContent,
            payload: version.map(|v| v.to_be_bytes().to_vec()),
        }
    }

    /// NOT_MODIFIED: `version u64 | last_modified i64`
    pub fn not_modified(version: u64, last_modified: i64) -> Self {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u64(version);
        buf.put_i64(last_modified);
        Self {
            status: Status::NotModified,
            payload: Some(buf.to_vec()),
        }
    }

    /// NOT_FOUND without a message
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: None,
        }
    }

    /// ERROR with a message
    pub fn error(message: &str) -> Self {
        Self::with_message(Status::Error, message)
    }

    /// BAD_REQUEST with a message
    pub fn bad_request(message: &str) -> Self {
        Self::with_message(Status::BadRequest, message)
    }

    fn with_message(status: Status, message: &str) -> Self {
        Self {
            status,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Map a store error onto its status, with the error text as payload
    pub fn from_store_error(err: &StoreError) -> Self {
        let status = match err {
            StoreError::NotFound => Status::NotFound,
            StoreError::Gone => Status::Gone,
            StoreError::VersionMismatch { .. } => Status::Conflict,
            StoreError::TooLarge { .. } => Status::TooLarge,
            StoreError::EngineUnavailable(_) | StoreError::Corrupt(_) => Status::Error,
        };
        Self::with_message(status, &err.to_string())
    }

    /// Payload interpreted as a UTF-8 message (lossy)
    pub fn message(&self) -> String {
        self.payload
            .as_deref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .unwrap_or_default()
    }
}
