//! Server configuration.

use crate::auth::AuthConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the coordinator server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Time allowed for a single request.
    pub request_timeout: Duration,
    /// Largest accepted request frame in bytes.
    pub max_frame_bytes: usize,
    /// Largest accepted `limit` on collection queries.
    pub max_page_size: usize,
    /// Admin token settings. Admin operations are refused when absent.
    pub auth: Option<AuthConfig>,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: 1000,
            request_timeout: Duration::from_secs(30),
            max_frame_bytes: 1024 * 1024, // 1 MB
            max_page_size: 10_000,
            auth: None,
        }
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum frame size.
    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Sets the maximum page size.
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    /// Enables admin tokens signed with `secret`.
    pub fn with_admin_secret(mut self, secret: Vec<u8>) -> Self {
        self.auth = Some(AuthConfig::new(secret));
        self
    }

    /// Sets the admin token configuration.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 50051)))
    }
}
