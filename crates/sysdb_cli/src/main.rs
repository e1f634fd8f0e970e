//! SysDB CLI
//!
//! Command-line tools for running and maintaining a SysDB coordinator.
//!
//! # Commands
//!
//! - `serve` - Run the coordinator API
//! - `inspect` - Display tenants, databases, collections and store counters
//! - `purge` - Remove tombstones older than the retention window
//! - `admin-token` - Mint an admin token for privileged RPCs

mod commands;

use clap::{Parser, Subcommand};
use commands::CliError;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SysDB coordinator tools.
#[derive(Parser)]
#[command(name = "sysdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the coordinator data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator API
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:50051")]
        bind: SocketAddr,

        /// Keep all state in memory instead of under --path
        #[arg(long)]
        in_memory: bool,

        /// Secret for admin tokens; admin RPCs are refused without one
        #[arg(long)]
        admin_secret: Option<String>,

        /// Permit ResetState
        #[arg(long)]
        allow_reset: bool,

        /// Create the default tenant and database on start
        #[arg(long)]
        bootstrap_defaults: bool,

        /// Create unknown tenants on first use
        #[arg(long)]
        implicit_tenants: bool,

        /// Maximum concurrent connections
        #[arg(long, default_value = "1000")]
        max_connections: usize,
    },

    /// Display tenants, databases, collections and store counters
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove tombstones older than the retention window
    Purge {
        /// Retention window in seconds
        #[arg(short, long, default_value = "3600")]
        retention_secs: u64,
    },

    /// Mint an admin token
    AdminToken {
        /// Shared admin secret
        #[arg(short, long)]
        secret: String,

        /// Principal recorded in the token
        #[arg(long, default_value = "admin")]
        principal: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins when set
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            in_memory,
            admin_secret,
            allow_reset,
            bootstrap_defaults,
            implicit_tenants,
            max_connections,
        } => {
            let path = if in_memory {
                None
            } else {
                Some(cli.path.ok_or(CliError::MissingPath("serve"))?)
            };
            commands::serve::run(commands::serve::ServeOptions {
                path,
                bind,
                admin_secret,
                allow_reset,
                bootstrap_defaults,
                implicit_tenants,
                max_connections,
            })?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or(CliError::MissingPath("inspect"))?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Purge { retention_secs } => {
            let path = cli.path.ok_or(CliError::MissingPath("purge"))?;
            commands::purge::run(&path, retention_secs)?;
        }
        Commands::AdminToken { secret, principal } => {
            println!("{}", commands::admin_token::run(&secret, &principal)?);
        }
        Commands::Version => {
            println!("SysDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("SysDB Core v{}", sysdb_core::VERSION);
        }
    }

    Ok(())
}
