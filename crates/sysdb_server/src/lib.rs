//! # SysDB Server
//!
//! Coordinator API for the SysDB metadata coordinator.
//!
//! This crate provides:
//! - Request and response messages for the fifteen coordinator RPCs
//! - A dispatcher mapping method names to handlers
//! - Request shape validation in front of `sysdb_core`
//! - Admin tokens (HMAC-SHA256) that mint an `AdminCapability`
//! - A tokio JSON-lines serving loop
//!
//! # Admin operations
//!
//! `ResetState` only runs when the caller presents a valid admin token and
//! the coordinator was opened with resets allowed:
//!
//! ```rust,ignore
//! use sysdb_server::{AdminAuth, AuthConfig, ServerConfig};
//!
//! let secret = b"my-secure-secret-32-bytes-long!".to_vec();
//! let config = ServerConfig::default().with_admin_secret(secret.clone());
//!
//! let token = AdminAuth::new(AuthConfig::new(secret)).create_token("ops")?;
//! // send {"method":"ResetState","request":{},"admin_token":token}
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod dispatcher;
mod error;
mod handler;
pub mod messages;
mod server;

pub use auth::{AdminAuth, AuthConfig};
pub use config::ServerConfig;
pub use dispatcher::Dispatcher;
pub use error::{ServerError, ServerResult, StatusCode};
pub use handler::{CallContext, RequestHandler};
pub use messages::Method;
pub use server::{CoordinatorServer, ErrorBody, RequestFrame, ResponseFrame};
