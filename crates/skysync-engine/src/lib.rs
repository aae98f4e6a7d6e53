//! The diff-and-apply core: walks a share tree against a target tree and
//! emits batched create/transfer/delete operations, recording every decision
//! as task-item audit rows. Failures feed an adaptive policy that decides
//! between retrying, skipping, and aborting.

pub mod policy;
pub mod report;
pub mod sync;

pub use policy::{ErrorClass, ErrorPolicy, PolicyAction, MAX_TOTAL_ERRORS};
pub use report::{SyncOutcome, SyncStats};
pub use sync::{execute_sync, EngineSettings};
