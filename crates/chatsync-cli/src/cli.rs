use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "chatsync")]
#[command(about = "Keep chat history in sync between this device and a remote store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to a JSON settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Remote store base URL
    #[arg(long, global = true, value_name = "URL")]
    pub remote_url: Option<String>,

    /// Quick send: chatsync "my message"
    #[arg(trailing_var_arg = true)]
    pub message: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a message locally and send it to the remote store
    ///
    /// The immediate send does not take the sync lock, so a running daemon
    /// may send the same message again.
    #[command(alias = "add")]
    Send {
        /// Message content
        content: Vec<String>,
    },
    /// List recent messages, newest first
    List {
        /// Number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only show messages not yet synced
        #[arg(long)]
        pending: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all local messages and clear the remote store
    Clear,
    /// Run one sync pass and report its progress
    ///
    /// Refuses to run while a daemon or another sync holds the lock file next
    /// to the database.
    Sync {
        /// Print each status as a JSON line
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing in the background until interrupted
    ///
    /// Holds the database's sync lock while running.
    Daemon,
    /// Show the resolved settings
    Config,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
