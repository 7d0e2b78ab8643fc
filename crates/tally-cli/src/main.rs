//! Tally CLI - record offline point-of-sale mutations and push them upstream
//!
//! Drives the same local store and push orchestrator the app uses, so a
//! terminal can inspect the mutation log or run sync cycles by hand.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::media::run_media_check;
use crate::commands::push::run_push;
use crate::commands::record::run_record;
use crate::commands::requests::run_requests;
use crate::commands::run::run_periodic;
use crate::commands::status::run_status;
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
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tally=info")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Record {
            entity,
            action,
            data,
        } => run_record(entity, action.into(), &data, &db_path).await?,
        Commands::Push { entities, json } => run_push(&entities, json, &db_path).await?,
        Commands::Run { interval } => run_periodic(interval, &db_path).await?,
        Commands::Status { json } => run_status(json, &db_path).await?,
        Commands::Requests {
            entity,
            limit,
            json,
        } => run_requests(entity, limit, json, &db_path).await?,
        Commands::MediaCheck => run_media_check().await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
