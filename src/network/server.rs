//! TCP Server
//!
//! Accepts connections and dispatches them to a pool of worker threads.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, TrySendError};

use super::Connection;
use crate::config::Config;
use crate::error::{KvError, Result};
use crate::protocol::{write_response, Response};
use crate::store::VersionedStore;

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Stops a running [`Server`] from another thread
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// TCP server for etagkv
pub struct Server {
    config: Config,
    store: Arc<VersionedStore>,
    listener: Option<TcpListener>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Create a new server with the given config and store
    pub fn new(config: Config, store: Arc<VersionedStore>) -> Self {
        Self {
            config,
            store,
            listener: None,
            shutdown: ShutdownHandle {
                flag: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Bind the listen address. Called by `run` if not done beforehand.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            KvError::Network(format!("Failed to bind {}: {}", self.config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| KvError::Network("Listener not bound".to_string()))?;

        tracing::info!(
            addr = %listener.local_addr()?,
            workers = self.config.worker_threads,
            "Server listening"
        );

        let (sender, receiver) = channel::bounded::<TcpStream>(self.config.max_connections);
        let workers = self.spawn_workers(&receiver)?;
        drop(receiver);

        while !self.shutdown.is_shutdown() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    // Accepted sockets may inherit non-blocking mode
                    if let Err(e) = stream.set_nonblocking(false) {
                        tracing::warn!(%peer, "Dropping connection: {}", e);
                        continue;
                    }
                    match sender.try_send(stream) {
                        Ok(()) => tracing::trace!(%peer, "Connection queued"),
                        Err(TrySendError::Full(mut stream)) => {
                            tracing::warn!(%peer, "Connection queue full, rejecting client");
                            let _ = write_response(&mut stream, &Response::error("server busy"));
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            return Err(KvError::Network("All workers have exited".to_string()));
                        }
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("Shutdown requested, draining workers");
        drop(sender);
        for worker in workers {
            let _ = worker.join();
        }

        Ok(())
    }

    fn spawn_workers(&self, receiver: &Receiver<TcpStream>) -> Result<Vec<JoinHandle<()>>> {
        (0..self.config.worker_threads)
            .map(|id| {
                let receiver = receiver.clone();
                let store = Arc::clone(&self.store);
                let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

                thread::Builder::new()
                    .name(format!("etagkv-worker-{}", id))
                    .spawn(move || {
                        for stream in receiver.iter() {
                            if let Err(e) = serve(stream, Arc::clone(&store), read_ms, write_ms) {
                                tracing::debug!(worker = id, "Connection ended with error: {}", e);
                            }
                        }
                    })
                    .map_err(KvError::from)
            })
            .collect()
    }
}

fn serve(stream: TcpStream, store: Arc<VersionedStore>, read_ms: u64, write_ms: u64) -> Result<()> {
    let mut connection = Connection::new(stream, store)?;
    connection.set_timeouts(read_ms, write_ms)?;
    connection.handle()
}
