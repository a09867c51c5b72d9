pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "anifeed")]
#[command(about = "Announces AniList activity to webhook channels", long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ~/.config/anifeed/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the polling daemon
    Run,
    /// Start tracking a user's activity in a destination channel
    Add {
        /// AniList username
        identity: String,
        /// Webhook URL to announce to
        destination: String,
        /// Activity kind: anime, manga or text
        #[arg(short, long, default_value = "anime")]
        kind: String,
    },
    /// Stop tracking a user's activity in a destination channel
    Remove {
        /// AniList username
        identity: String,
        /// Webhook URL the subscription posts to
        destination: String,
        /// Activity kind: anime, manga or text
        #[arg(short, long, default_value = "anime")]
        kind: String,
    },
    /// List tracked subscriptions
    List,
    /// Show or edit a destination's status filter
    Filter {
        /// Webhook URL the filter applies to
        destination: String,
        /// Hide a status category: progress, planning, dropped or paused
        #[arg(long)]
        hide: Vec<String>,
        /// Show a previously hidden status category
        #[arg(long)]
        show: Vec<String>,
    },
}
