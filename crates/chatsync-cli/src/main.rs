//! chatsync CLI - chat history that survives going offline
//!
//! Messages are written to a local database first and synced with a remote
//! store whenever the network allows.

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::clear::run_clear;
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::daemon::run_daemon;
use crate::commands::list::run_list;
use crate::commands::send::run_send;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatsync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell, output }) = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let context = Context::resolve(cli.config, cli.db_path, cli.remote_url)?;

    match cli.command {
        Some(Commands::Send { content }) => run_send(&content, &context).await?,
        Some(Commands::List {
            limit,
            pending,
            json,
        }) => run_list(limit, pending, json, &context).await?,
        Some(Commands::Clear) => run_clear(&context).await?,
        Some(Commands::Sync { json }) => run_sync(json, &context).await?,
        Some(Commands::Daemon) => run_daemon(&context).await?,
        Some(Commands::Config) => run_config(&context)?,
        Some(Commands::Completions { .. }) => {}
        None => {
            // Quick send mode: chatsync "my message"
            if cli.message.is_empty() {
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            } else {
                run_send(&cli.message, &context).await?;
            }
        }
    }

    Ok(())
}
