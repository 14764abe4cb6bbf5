//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Worker thread pool for connections, fed by a bounded channel
//! - Commands routed through the [`VersionedStore`](crate::store::VersionedStore)

mod client;
mod connection;
mod server;

pub use client::{Client, ClientError, ClientResult, Fetched};
pub use connection::{execute, Connection};
pub use server::{Server, ShutdownHandle};
