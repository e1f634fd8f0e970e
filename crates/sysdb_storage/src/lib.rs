//! # SysDB Storage
//!
//! Durable keyed storage backends for the SysDB metadata coordinator.
//!
//! Backends are **opaque keyed byte stores**. They know nothing about
//! tenants, collections, versions or tombstones; the entity store in
//! `sysdb_core` owns all record interpretation.
//!
//! ## Design Principles
//!
//! - Keys are UTF-8 strings, values are opaque bytes
//! - A [`WriteBatch`] is applied atomically: every operation or none
//! - Prefix scans return keys in ascending order
//! - Backends must be `Send + Sync` and shareable behind an `Arc`
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral coordinators
//! - [`FileBackend`] - Append-only batch log replayed on open
//!
//! ## Example
//!
//! ```rust
//! use sysdb_storage::{InMemoryBackend, KvBackend, WriteBatch};
//!
//! let backend = InMemoryBackend::new();
//! let mut batch = WriteBatch::new();
//! batch.put("tenant/t1", b"record".to_vec());
//! backend.write_batch(batch).unwrap();
//! assert_eq!(backend.get("tenant/t1").unwrap(), Some(b"record".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod batch;
mod crc;
mod error;
mod file;
mod memory;

pub use backend::KvBackend;
pub use batch::{BatchOp, WriteBatch};
pub use crc::compute_crc32;
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, LOG_MAGIC};
pub use memory::InMemoryBackend;
