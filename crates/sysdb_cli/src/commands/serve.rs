//! Serve command implementation.

use super::CliError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use sysdb_core::{SysDb, SysDbConfig};
use sysdb_server::{CoordinatorServer, ServerConfig};
use tokio::net::TcpListener;
use tracing::info;

/// Options for `sysdb serve`.
#[derive(Debug)]
pub struct ServeOptions {
    /// Data directory; in-memory when absent.
    pub path: Option<PathBuf>,
    /// Listen address.
    pub bind: SocketAddr,
    /// Admin token secret.
    pub admin_secret: Option<String>,
    /// Permit `ResetState`.
    pub allow_reset: bool,
    /// Create the default tenant and database.
    pub bootstrap_defaults: bool,
    /// Create unknown tenants on first use.
    pub implicit_tenants: bool,
    /// Connection limit.
    pub max_connections: usize,
}

impl ServeOptions {
    fn db_config(&self) -> SysDbConfig {
        SysDbConfig::new()
            .allow_reset(self.allow_reset)
            .bootstrap_defaults(self.bootstrap_defaults)
            .implicit_tenants(self.implicit_tenants)
    }

    fn server_config(&self) -> ServerConfig {
        let config = ServerConfig::new(self.bind).with_max_connections(self.max_connections);
        match &self.admin_secret {
            Some(secret) => config.with_admin_secret(secret.as_bytes().to_vec()),
            None => config,
        }
    }
}

/// Runs the coordinator until Ctrl-C.
pub fn run(options: ServeOptions) -> Result<(), CliError> {
    let db = match &options.path {
        Some(path) => {
            info!(path = %path.display(), "opening coordinator");
            SysDb::open_path(path, options.db_config())?
        }
        None => {
            info!("opening in-memory coordinator");
            SysDb::open_in_memory(options.db_config())?
        }
    };
    if options.admin_secret.is_none() {
        info!("no admin secret configured, admin RPCs are disabled");
    }
    let server = Arc::new(CoordinatorServer::new(
        Arc::new(db),
        options.server_config(),
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let listener = TcpListener::bind(options.bind).await?;
        server
            .serve_until(listener, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        Ok::<(), CliError>(())
    })
}
