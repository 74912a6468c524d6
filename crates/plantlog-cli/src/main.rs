//! Plantlog CLI - capture and sync plant-floor records
//!
//! Works fully offline; `plantlog sync` reconciles with the plant server
//! when connectivity returns.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
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
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("plantlog=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Record { command } => commands::record::run(command, &db_path)?,
        Commands::Sync { command } => commands::sync::run(command, &db_path).await?,
        Commands::Config { command } => commands::config::run(command, &db_path)?,
        Commands::Info { json } => commands::info::run(json, &db_path)?,
        Commands::Completions { shell, output } => {
            commands::completions::run(shell, output.as_deref())?;
        }
    }

    Ok(())
}
