use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use skysync_domain::{ShareInfo, UserInfo};

use crate::error::StoreError;
use crate::state::{
    DispatchEvent, DriveAccount, NewTaskItem, Resource, RuleTemplate, SyncConfig, SyncTask,
    SyncTaskItem, TaskStatus,
};

/// Persistence surface of the sync system.
///
/// Backed by Postgres in production and by [`InMemoryStore`](crate::memory::InMemoryStore)
/// in tests. All `upsert_*` methods insert when the record's id is 0 and
/// return the effective id.
#[async_trait]
pub trait SyncStore: Send + Sync + 'static {
    // ── Accounts ──────────────────────────────────────────────────────────────

    async fn get_account(&self, id: i64) -> Result<Option<DriveAccount>, StoreError>;
    async fn list_accounts(&self, only_valid: bool) -> Result<Vec<DriveAccount>, StoreError>;
    async fn upsert_account(&self, account: &DriveAccount) -> Result<i64, StoreError>;

    /// Maintenance refresh of profile/quota fields; also re-marks the account
    /// valid, since the provider just answered.
    async fn update_account_profile(&self, id: i64, info: &UserInfo) -> Result<(), StoreError>;
    async fn set_account_validity(&self, id: i64, valid: bool) -> Result<(), StoreError>;

    // ── Configurations ────────────────────────────────────────────────────────

    async fn get_config(&self, id: i64) -> Result<Option<SyncConfig>, StoreError>;
    async fn list_enabled_configs(&self) -> Result<Vec<SyncConfig>, StoreError>;
    async fn upsert_config(&self, config: &SyncConfig) -> Result<i64, StoreError>;

    /// The dedup fence: a single-statement update of `last_sync`, issued
    /// before any provider call of a job.
    async fn touch_last_sync(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    // ── Rule templates ────────────────────────────────────────────────────────

    async fn get_template(&self, id: i64) -> Result<Option<RuleTemplate>, StoreError>;
    async fn upsert_template(&self, template: &RuleTemplate) -> Result<i64, StoreError>;
    async fn bump_template_usage(&self, id: i64) -> Result<(), StoreError>;

    // ── Tasks & items ─────────────────────────────────────────────────────────

    async fn create_task(
        &self,
        config_id: i64,
        start_time: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    async fn finish_task(
        &self,
        id: i64,
        status: TaskStatus,
        dura_time: i64,
        task_num: Value,
        err_msg: Option<String>,
    ) -> Result<(), StoreError>;

    async fn get_task(&self, id: i64) -> Result<Option<SyncTask>, StoreError>;
    async fn list_tasks(
        &self,
        config_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<SyncTask>, StoreError>;

    /// Appends preserve call order; item ids are monotonically increasing
    /// within a task.
    async fn append_task_item(&self, item: &NewTaskItem) -> Result<i64, StoreError>;
    async fn list_task_items(&self, task_id: i64) -> Result<Vec<SyncTaskItem>, StoreError>;

    // ── Resources ─────────────────────────────────────────────────────────────

    async fn upsert_resource(&self, resource: &Resource) -> Result<i64, StoreError>;

    /// Active resources whose share expires at or before `threshold`.
    async fn list_expiring_resources(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Resource>, StoreError>;

    async fn update_resource_share(
        &self,
        id: i64,
        share: &ShareInfo,
    ) -> Result<(), StoreError>;

    // ── Dispatch journal ──────────────────────────────────────────────────────

    async fn append_event(&self, event: &DispatchEvent) -> Result<(), StoreError>;
    async fn list_events(&self, limit: u32) -> Result<Vec<DispatchEvent>, StoreError>;
}
