//! # etagkv
//!
//! A versioned key-value document store with:
//! - Optimistic concurrency control through content-derived versions
//! - Conditional reads and writes with HTTP entity-tag semantics
//! - Pluggable storage engines (in-memory, or WAL + SSTable on disk)
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   VersionedStore                             │
//! │        (Version checks under per-key lock stripes)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  StorageEngine
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │MemoryEngine │          │  LsmEngine  │
//!   │ (BTreeMap)  │          │ WAL+MemTable│
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod store;
pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, EngineKind};
pub use engine::{LsmEngine, MemoryEngine, StorageEngine};
pub use store::{Deletion, KeyValue, Lookup, StoreError, VersionedRecord, VersionedStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of etagkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
