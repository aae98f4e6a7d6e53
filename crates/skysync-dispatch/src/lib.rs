//! Cron-driven dispatch of sync jobs plus the periodic maintenance workers
//! (share refresh, dead-share cleanup, account profile refresh).

pub mod dispatcher;
pub mod error;
pub mod maintenance;
pub mod schedule;

pub use dispatcher::{Dispatcher, DispatcherSettings, TickSummary};
pub use error::DispatchError;
pub use maintenance::{
    cleanup_expired_local_shares, refresh_drive_users, refresh_expiring_resources,
    ResourceRefreshSummary, ShareCleanupSummary, UserRefreshSummary,
};
pub use schedule::{due_fire, eligibility, next_fire, parse_cron, Eligibility};
