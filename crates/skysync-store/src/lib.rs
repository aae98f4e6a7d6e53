pub mod error;
pub mod memory;
pub mod postgres;
pub mod state;
pub mod store;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use state::{
    DispatchEvent, DriveAccount, ItemStatus, NewTaskItem, OpKind, Resource, RuleTemplate,
    SyncConfig, SyncTask, SyncTaskItem, TaskStatus,
};
pub use store::SyncStore;
