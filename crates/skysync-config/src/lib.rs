pub mod error;
pub mod seed;
pub mod settings;

pub use error::ConfigError;
pub use seed::{apply_seed, load_seed, SeedFile, SeedSummary};
pub use settings::{load_settings, AppSettings, DatabaseSettings, DispatcherConfig, SyncTuning};
