mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = commands::load_settings(cli.settings.as_deref(), cli.database_url)?;

    match cli.command {
        Command::Serve => commands::serve(settings).await,
        Command::Tick => commands::tick(settings).await,
        Command::Sync { config_id } => commands::sync_once(settings, config_id).await,
        Command::Apply { seed } => commands::apply(settings, &seed).await,
        Command::Tasks { config_id, limit } => commands::tasks(settings, config_id, limit).await,
        Command::Items { task_id } => commands::items(settings, task_id).await,
        Command::Events { limit } => commands::events(settings, limit).await,
        Command::Maintain { worker } => commands::maintain(settings, worker).await,
    }
}
