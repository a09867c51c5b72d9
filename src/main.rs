use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use anifeed::app::AppContext;
use anifeed::cli::{commands, Cli, Commands};
use anifeed::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Run => {
            commands::run(Arc::new(ctx)).await?;
        }
        Commands::Add {
            identity,
            destination,
            kind,
        } => {
            commands::add(&ctx, &identity, &destination, &kind).await?;
        }
        Commands::Remove {
            identity,
            destination,
            kind,
        } => {
            commands::remove(&ctx, &identity, &destination, &kind).await?;
        }
        Commands::List => {
            commands::list(&ctx)?;
        }
        Commands::Filter {
            destination,
            hide,
            show,
        } => {
            commands::filter(&ctx, &destination, &hide, &show)?;
        }
    }

    Ok(())
}
