mod cli;
mod company;
mod config;
mod error;
mod llm;
mod organizer;
mod parser;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::commands::organize::OrganizeOptions;
use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing - only show warnings by default, use RUST_LOG=info for more detail
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cli::commands::init::run(force).await?;
        }
        Commands::Organize {
            input,
            output,
            provider,
            model,
            dry_run,
            copy,
            structure,
            filename,
            threshold,
            no_normalize,
            no_merge,
            concurrency,
        } => {
            cli::commands::organize::run(OrganizeOptions {
                input,
                output,
                provider,
                model,
                dry_run,
                copy,
                structure,
                filename,
                threshold,
                no_normalize,
                no_merge,
                concurrency,
            })
            .await?;
        }
        Commands::Companies {
            output,
            json,
            resolve,
        } => {
            cli::commands::companies::run(output, json, resolve).await?;
        }
        Commands::Merge { output, dry_run } => {
            cli::commands::merge::run(output, dry_run).await?;
        }
        Commands::Undo { output } => {
            cli::commands::undo::run(output).await?;
        }
        Commands::Doctor => {
            cli::commands::doctor::run().await?;
        }
    }

    Ok(())
}
