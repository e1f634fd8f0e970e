//! # SysDB Testkit
//!
//! Test utilities for SysDB.
//!
//! This crate provides:
//! - Test fixtures and coordinator helpers
//! - Property-based test generators using proptest
//! - A fault-injecting storage backend
//! - Concurrency stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sysdb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_coordinator() {
//!     with_temp_sysdb(|db| {
//!         let tenant = db.namespace().create_tenant(&tenant("t1"), None).unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
