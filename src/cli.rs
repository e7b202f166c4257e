//! Command-line surface. Flags override the config file.

use cc_core::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "clipcast")]
#[command(version, about = "Broadcast clipboard text to subscribers on the local network", long_about = None)]
pub struct Cli {
    /// Config file path (default: <config dir>/clipcast/clipcast.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write logs to the local data directory
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Publish this machine's clipboard
    Serve {
        /// Bind address, or "auto" for this host's LAN address
        #[arg(short, long)]
        address: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Maximum number of simultaneous subscribers
        #[arg(short, long)]
        max_connections: Option<usize>,
        /// Print every published value
        #[arg(long)]
        show_data: bool,
    },
    /// Receive the publisher's clipboard
    Subscribe {
        /// Publisher address
        #[arg(short, long)]
        server: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Copy every update to the clipboard immediately
        #[arg(long, conflicts_with = "confirm")]
        auto_copy: bool,
        /// Show updates and copy only when Enter is pressed
        #[arg(long)]
        confirm: bool,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        match &self.command {
            Commands::Serve {
                address,
                port,
                max_connections,
                show_data,
            } => {
                if let Some(address) = address {
                    config.server.address = address.clone();
                }
                if let Some(port) = port {
                    config.server.port = *port;
                }
                if let Some(max) = max_connections {
                    config.server.max_connections = *max;
                }
                if *show_data {
                    config.server.show_data = true;
                }
            }
            Commands::Subscribe {
                server,
                port,
                auto_copy,
                confirm,
            } => {
                if let Some(server) = server {
                    config.client.server_address = server.clone();
                }
                if let Some(port) = port {
                    config.client.server_port = *port;
                }
                if *auto_copy {
                    config.client.auto_copy = true;
                }
                if *confirm {
                    config.client.auto_copy = false;
                }
            }
        }
    }
}
