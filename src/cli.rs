use clap::{Parser, Subcommand};

/// hookgate: token-gated reverse proxy for webhook endpoints
#[derive(Debug, Parser)]
#[command(name = "hookgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage users in the configured registry
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Validate and print the configured forwarding routes
    Routes,
}

#[derive(Debug, Subcommand)]
pub enum UserCommands {
    /// Issue a new token
    Issue {
        #[arg(long)]
        name: String,
        /// Create the user with admin privileges (bootstraps the first admin)
        #[arg(long)]
        admin: bool,
    },
    /// Look up the record behind a token
    Show {
        #[arg(long)]
        token: String,
    },
    /// Grant admin to every user with this name
    Promote {
        #[arg(long)]
        name: String,
    },
    /// Delete every user with this name
    Delete {
        #[arg(long)]
        name: String,
    },
}
