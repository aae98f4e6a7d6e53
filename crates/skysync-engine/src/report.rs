use serde::Serialize;
use serde_json::{json, Value};

/// Running counters for one sync job. `errors` collects the rendered message
/// of every batch failure in occurrence order; the first entry becomes the
/// task's `err_msg`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    /// Every file considered, whether transferred or skipped.
    pub files_processed: u64,
    pub folder_created: u64,
    pub files_transferred: u64,
    pub files_deleted: u64,
    pub files_skipped: u64,
    pub errors: Vec<String>,
}

impl SyncStats {
    /// The JSON counter blob persisted as `sync_task.task_num`.
    pub fn counters(&self) -> Value {
        json!({
            "files_processed": self.files_processed,
            "folder_created": self.folder_created,
            "files_transferred": self.files_transferred,
            "files_deleted": self.files_deleted,
            "files_skipped": self.files_skipped,
            "errors": self.errors.len(),
        })
    }

    pub fn first_error(&self) -> Option<String> {
        self.errors.first().cloned()
    }
}

/// Terminal result of one sync job. Failures surface here, never as errors
/// out of the engine.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub success: bool,
    pub config_id: i64,
    /// Absent when the job failed before a task row existed.
    pub task_id: Option<i64>,
    pub stats: SyncStats,
    pub error: Option<String>,
    pub elapsed_secs: i64,
    /// Informational note for runs that did no work (e.g. past deadline).
    pub message: Option<String>,
}

impl SyncOutcome {
    pub fn failed(config_id: i64, task_id: Option<i64>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            config_id,
            task_id,
            stats: SyncStats::default(),
            error: Some(error.into()),
            elapsed_secs: 0,
            message: None,
        }
    }
}
