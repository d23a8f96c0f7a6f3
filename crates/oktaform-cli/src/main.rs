use clap::Parser;
use eyre::Result;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match &cli.command {
        Commands::Plan(args) => commands::plan(&cli, !args.no_refresh).await,
        Commands::Apply(args) => commands::apply(&cli, !args.no_refresh).await,
        Commands::Destroy => commands::destroy(&cli).await,
        Commands::Import(args) => commands::import(&cli, &args.address, &args.id).await,
        Commands::Schema => commands::schema(),
    }
}
