use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "skysync",
    about = "Cloud-drive share synchronization: diff share trees against your own drive and let the provider copy server-side",
    version
)]
pub struct Cli {
    /// Path to the YAML settings file. Defaults are used when absent.
    #[arg(long, env = "SKYSYNC_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Postgres connection string; overrides the settings file. Without any
    /// database the in-memory store is used and state dies with the process.
    #[arg(long, env = "SKYSYNC_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the cron dispatcher and maintenance loops until interrupted.
    Serve,

    /// Run one dispatcher pass and exit.
    Tick,

    /// Run a single sync job now, regardless of its schedule.
    Sync {
        /// The sync configuration to execute.
        config_id: i64,
    },

    /// Upsert accounts, templates, configs, and resources from a seed file.
    Apply {
        /// Path to the YAML seed file.
        seed: PathBuf,
    },

    /// List recent sync tasks.
    Tasks {
        /// Filter to one configuration.
        #[arg(long)]
        config_id: Option<i64>,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// List the operation log of one task.
    Items {
        task_id: i64,
    },

    /// Show recent dispatcher journal entries.
    Events {
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },

    /// Run one maintenance worker and exit.
    Maintain {
        #[arg(value_enum)]
        worker: MaintenanceWorker,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MaintenanceWorker {
    /// Re-fetch profile/quota for every account.
    RefreshUsers,
    /// Re-share catalogued resources that expire soon.
    RefreshResources,
    /// Cancel expired shares on the provider side.
    CleanupShares,
}
