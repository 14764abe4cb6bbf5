//! Blocking client
//!
//! One request in flight per connection. Non-success statuses are mapped
//! back onto [`ClientError`] so callers can match on them like store errors.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::error::KvError;
use crate::protocol::{
    decode_entry, decode_keys, decode_version_tag, read_response, write_command, Command,
    Response, Status,
};
use crate::store::VersionedRecord;

/// Errors surfaced by [`Client`] calls
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Key not found")]
    NotFound,

    #[error("Key no longer exists")]
    Gone,

    #[error("Version conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Entry too large: {0}")]
    TooLarge(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Unexpected response status {0:?}")]
    Unexpected(Status),

    #[error(transparent)]
    Transport(#[from] KvError),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Transport(KvError::Io(err))
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Result of a conditional GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Entry(VersionedRecord),
    NotModified { version: u64, last_modified: i64 },
}

/// Synchronous TCP client for the etagkv server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    pub fn set_timeout(&self, timeout: Option<Duration>) -> ClientResult<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        self.writer.get_ref().set_write_timeout(timeout)?;
        Ok(())
    }

    pub fn ping(&mut self) -> ClientResult<()> {
        let response = self.call(&Command::Ping)?;
        match response.status {
            Status::Ok => Ok(()),
            _ => Err(status_error(response)),
        }
    }

    /// GET with an optional entity tag (0 for none)
    pub fn get(&mut self, key: &str, if_none_match: u64) -> ClientResult<Fetched> {
        let response = self.call(&Command::Get {
            key: key.as_bytes().to_vec(),
            if_none_match,
        })?;

        match response.status {
            Status::Ok => {
                let (version, last_modified, payload) = decode_entry(payload_of(&response))?;
                Ok(Fetched::Entry(VersionedRecord::new(
                    payload,
                    version,
                    last_modified,
                )))
            }
            Status::NotModified => {
                let (version, last_modified, _) = decode_entry(payload_of(&response))?;
                Ok(Fetched::NotModified {
                    version,
                    last_modified,
                })
            }
            _ => Err(status_error(response)),
        }
    }

    /// Conditional PUT; returns the new version
    pub fn put(&mut self, key: &str, value: &[u8], if_match: u64) -> ClientResult<u64> {
        let response = self.call(&Command::Put {
            key: key.as_bytes().to_vec(),
            value: value.to_vec(),
            if_match,
        })?;

        match response.status {
            Status::NoContent => Ok(decode_version_tag(payload_of(&response))?),
            _ => Err(status_error(response)),
        }
    }

    pub fn delete(&mut self, key: &str) -> ClientResult<()> {
        let response = self.call(&Command::Delete {
            key: key.as_bytes().to_vec(),
        })?;

        match response.status {
            Status::NoContent => Ok(()),
            _ => Err(status_error(response)),
        }
    }

    /// Keys starting with `prefix`, in key order
    pub fn find(&mut self, prefix: &str) -> ClientResult<Vec<String>> {
        let response = self.call(&Command::Find {
            prefix: prefix.as_bytes().to_vec(),
        })?;

        match response.status {
            Status::Ok => Ok(decode_keys(payload_of(&response))?),
            _ => Err(status_error(response)),
        }
    }

    fn call(&mut self, command: &Command) -> ClientResult<Response> {
        write_command(&mut self.writer, command)?;
        Ok(read_response(&mut self.reader)?)
    }
}

fn payload_of(response: &Response) -> &[u8] {
    response.payload.as_deref().unwrap_or(&[])
}

fn status_error(response: Response) -> ClientError {
    match response.status {
        Status::NotFound => ClientError::NotFound,
        Status::Gone => ClientError::Gone,
        Status::Conflict => ClientError::Conflict(response.message()),
        Status::BadRequest => ClientError::BadRequest(response.message()),
        Status::TooLarge => ClientError::TooLarge(response.message()),
        Status::Error => ClientError::Server(response.message()),
        other => ClientError::Unexpected(other),
    }
}
