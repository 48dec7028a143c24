use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "hotel-notify")]
#[command(about = "Follow and manage hotel dashboard notifications")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dashboard API base URL (overrides the config file)
    #[arg(long, global = true, env = "HOTEL_NOTIFY_BASE_URL")]
    pub base_url: Option<String>,

    /// Session token (overrides the config file)
    #[arg(long, global = true, env = "HOTEL_NOTIFY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    pub output: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to the push channel and print notifications as they arrive
    Watch,

    /// Fetch and print the current notification list
    List {
        /// Only show unread notifications
        #[arg(long)]
        unread: bool,
    },

    /// Mark one notification as read
    Read {
        /// Notification id
        id: String,
    },

    /// Mark every notification as read
    ReadAll,

    /// Delete one notification
    Delete {
        /// Notification id
        id: String,
    },

    /// Configuration management
    Config {
        /// Show the effective configuration (token redacted)
        #[arg(long)]
        show: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Pretty,
    /// One JSON document per line
    Json,
}
