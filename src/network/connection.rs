//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{KvError, Result};
use crate::protocol::{read_command, write_response, Command, Response};
use crate::store::{Lookup, VersionedStore};

/// Handles a single client connection
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    store: Arc<VersionedStore>,
    /// Peer address for logging
    peer_addr: String,
}

/// Errors that just mean the peer went away (or idled out)
fn is_disconnect(err: &KvError) -> bool {
    match err {
        KvError::Io(e) => matches!(
            e.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::WouldBlock
                | ErrorKind::TimedOut
        ),
        _ => false,
    }
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, store: Arc<VersionedStore>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            store,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 disables a timeout)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read = (read_ms > 0).then(|| Duration::from_millis(read_ms));
        let write = (write_ms > 0).then(|| Duration::from_millis(write_ms));
        self.reader.get_ref().set_read_timeout(read)?;
        self.writer.get_ref().set_write_timeout(write)?;
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads commands in a loop and sends responses.
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(peer = %self.peer_addr, "Connection established");

        loop {
            let command = match read_command(&mut self.reader) {
                Ok(cmd) => cmd,
                Err(e) if is_disconnect(&e) => {
                    tracing::debug!(peer = %self.peer_addr, "Client disconnected: {}", e);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, "Error reading command: {}", e);
                    let _ = write_response(&mut self.writer, &Response::bad_request(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!(peer = %self.peer_addr, "Received command: {:?}", command.command_type());

            let response = execute(&self.store, command);

            if let Err(e) = write_response(&mut self.writer, &response) {
                if is_disconnect(&e) {
                    tracing::debug!(
                        peer = %self.peer_addr,
                        "Client disconnected before response could be sent: {}",
                        e
                    );
                    return Ok(());
                }
                tracing::warn!(peer = %self.peer_addr, "Error writing response: {}", e);
                return Err(e);
            }
        }
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Run one command against the store and build its response
pub fn execute(store: &VersionedStore, command: Command) -> Response {
    match command {
        Command::Ping => Response::ok(Some(b"PONG".to_vec())),

        Command::Get { key, if_none_match } => {
            let key = match key_str(&key) {
                Ok(k) => k,
                Err(resp) => return resp,
            };
            match store.get(key, if_none_match) {
                Ok(Lookup::Found(record)) => Response::entry(&record),
                Ok(Lookup::NotModified {
                    version,
                    last_modified,
                }) => Response::not_modified(version, last_modified),
                Err(e) => Response::from_store_error(&e),
            }
        }

        Command::Put {
            key,
            value,
            if_match,
        } => {
            let key = match key_str(&key) {
                Ok(k) => k,
                Err(resp) => return resp,
            };
            match store.put(key, &value, if_match) {
                Ok(version) => Response::no_content(Some(version)),
                Err(e) => Response::from_store_error(&e),
            }
        }

        Command::Delete { key } => {
            let key = match key_str(&key) {
                Ok(k) => k,
                Err(resp) => return resp,
            };
            match store.delete(key) {
                Ok(_) => Response::no_content(None),
                Err(e) => Response::from_store_error(&e),
            }
        }

        Command::Find { prefix } => {
            let prefix = match key_str(&prefix) {
                Ok(p) => p,
                Err(resp) => return resp,
            };
            match store.find_by_prefix(prefix) {
                Ok(entries) => Response::keys(entries.iter().map(|kv| kv.key.as_str())),
                Err(e) => Response::from_store_error(&e),
            }
        }
    }
}

fn key_str(raw: &[u8]) -> std::result::Result<&str, Response> {
    std::str::from_utf8(raw).map_err(|_| Response::bad_request("key is not valid UTF-8"))
}
