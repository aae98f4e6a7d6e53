use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use skysync_domain::{ShareInfo, UserInfo};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::state::{
    DispatchEvent, DriveAccount, ItemStatus, NewTaskItem, Resource, RuleTemplate, SyncConfig,
    SyncTask, SyncTaskItem, TaskStatus,
};
use crate::store::SyncStore;

#[derive(Debug, Default)]
struct Inner {
    accounts: Vec<DriveAccount>,
    configs: Vec<SyncConfig>,
    templates: Vec<RuleTemplate>,
    tasks: Vec<SyncTask>,
    task_items: Vec<SyncTaskItem>,
    resources: Vec<Resource>,
    events: Vec<DispatchEvent>,
    next_id: i64,
}

impl Inner {
    fn alloc(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of [`SyncStore`].
///
/// All data is lost on process exit. Suitable for tests and one-shot runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStore for InMemoryStore {
    // ── Accounts ──────────────────────────────────────────────────────────────

    async fn get_account(&self, id: i64) -> Result<Option<DriveAccount>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn list_accounts(&self, only_valid: bool) -> Result<Vec<DriveAccount>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .accounts
            .iter()
            .filter(|a| !only_valid || a.is_valid)
            .cloned()
            .collect())
    }

    async fn upsert_account(&self, account: &DriveAccount) -> Result<i64, StoreError> {
        let mut guard = self.inner.write().await;
        if account.id != 0 {
            if let Some(existing) = guard.accounts.iter_mut().find(|a| a.id == account.id) {
                *existing = account.clone();
                return Ok(account.id);
            }
            return Err(StoreError::NotFound(format!("account {}", account.id)));
        }
        let id = guard.alloc();
        let mut account = account.clone();
        account.id = id;
        guard.accounts.push(account);
        Ok(id)
    }

    async fn update_account_profile(&self, id: i64, info: &UserInfo) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let account = guard
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        account.username = info.username.clone();
        account.avatar_url = info.avatar_url.clone();
        account.quota = info.quota as i64;
        account.used = info.used as i64;
        account.is_vip = info.is_vip;
        account.is_supervip = info.is_supervip;
        account.is_valid = true;
        Ok(())
    }

    async fn set_account_validity(&self, id: i64, valid: bool) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let account = guard
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        account.is_valid = valid;
        Ok(())
    }

    // ── Configurations ────────────────────────────────────────────────────────

    async fn get_config(&self, id: i64) -> Result<Option<SyncConfig>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.configs.iter().find(|c| c.id == id).cloned())
    }

    async fn list_enabled_configs(&self) -> Result<Vec<SyncConfig>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.configs.iter().filter(|c| c.enable).cloned().collect())
    }

    async fn upsert_config(&self, config: &SyncConfig) -> Result<i64, StoreError> {
        let mut guard = self.inner.write().await;
        if config.id != 0 {
            if let Some(existing) = guard.configs.iter_mut().find(|c| c.id == config.id) {
                *existing = config.clone();
                return Ok(config.id);
            }
            return Err(StoreError::NotFound(format!("config {}", config.id)));
        }
        let id = guard.alloc();
        let mut config = config.clone();
        config.id = id;
        guard.configs.push(config);
        Ok(id)
    }

    async fn touch_last_sync(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let config = guard
            .configs
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("config {id}")))?;
        config.last_sync = Some(at);
        Ok(())
    }

    // ── Rule templates ────────────────────────────────────────────────────────

    async fn get_template(&self, id: i64) -> Result<Option<RuleTemplate>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn upsert_template(&self, template: &RuleTemplate) -> Result<i64, StoreError> {
        let mut guard = self.inner.write().await;
        if template.id != 0 {
            if let Some(existing) = guard.templates.iter_mut().find(|t| t.id == template.id) {
                *existing = template.clone();
                return Ok(template.id);
            }
            return Err(StoreError::NotFound(format!("template {}", template.id)));
        }
        // template_name is unique: a fresh insert with a known name updates
        // in place, matching the SQL store's ON CONFLICT behaviour
        if let Some(existing) = guard
            .templates
            .iter_mut()
            .find(|t| t.template_name == template.template_name)
        {
            let id = existing.id;
            *existing = template.clone();
            existing.id = id;
            return Ok(id);
        }
        let id = guard.alloc();
        let mut template = template.clone();
        template.id = id;
        guard.templates.push(template);
        Ok(id)
    }

    async fn bump_template_usage(&self, id: i64) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if let Some(template) = guard.templates.iter_mut().find(|t| t.id == id) {
            template.usage_count += 1;
        }
        Ok(())
    }

    // ── Tasks & items ─────────────────────────────────────────────────────────

    async fn create_task(
        &self,
        config_id: i64,
        start_time: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut guard = self.inner.write().await;
        let id = guard.alloc();
        guard.tasks.push(SyncTask {
            id,
            config_id,
            start_time,
            status: TaskStatus::Running,
            dura_time: 0,
            task_num: Value::Object(Default::default()),
            err_msg: None,
        });
        Ok(id)
    }

    async fn finish_task(
        &self,
        id: i64,
        status: TaskStatus,
        dura_time: i64,
        task_num: Value,
        err_msg: Option<String>,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let task = guard
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("task {id}")))?;
        task.status = status;
        task.dura_time = dura_time;
        task.task_num = task_num;
        task.err_msg = err_msg;
        Ok(())
    }

    async fn get_task(&self, id: i64) -> Result<Option<SyncTask>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(
        &self,
        config_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<SyncTask>, StoreError> {
        let guard = self.inner.read().await;
        let filtered: Vec<SyncTask> = guard
            .tasks
            .iter()
            .filter(|t| config_id.map_or(true, |c| t.config_id == c))
            .cloned()
            .collect();
        let start = filtered.len().saturating_sub(limit as usize);
        Ok(filtered[start..].to_vec())
    }

    async fn append_task_item(&self, item: &NewTaskItem) -> Result<i64, StoreError> {
        let mut guard = self.inner.write().await;
        let id = guard.alloc();
        guard.task_items.push(SyncTaskItem {
            id,
            task_id: item.task_id,
            op: item.op,
            src_path: item.src_path.clone(),
            dst_path: item.dst_path.clone(),
            file_name: item.file_name.clone(),
            file_size: item.file_size,
            status: item.status,
            err_msg: item.err_msg.clone(),
        });
        Ok(id)
    }

    async fn list_task_items(&self, task_id: i64) -> Result<Vec<SyncTaskItem>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .task_items
            .iter()
            .filter(|i| i.task_id == task_id)
            .cloned()
            .collect())
    }

    // ── Resources ─────────────────────────────────────────────────────────────

    async fn upsert_resource(&self, resource: &Resource) -> Result<i64, StoreError> {
        let mut guard = self.inner.write().await;
        if resource.id != 0 {
            if let Some(existing) = guard.resources.iter_mut().find(|r| r.id == resource.id) {
                *existing = resource.clone();
                return Ok(resource.id);
            }
            return Err(StoreError::NotFound(format!("resource {}", resource.id)));
        }
        let id = guard.alloc();
        let mut resource = resource.clone();
        resource.id = id;
        guard.resources.push(resource);
        Ok(id)
    }

    async fn list_expiring_resources(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Resource>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .resources
            .iter()
            .filter(|r| {
                r.status == 1 && r.expired_at.map_or(false, |at| at <= threshold)
            })
            .cloned()
            .collect())
    }

    async fn update_resource_share(&self, id: i64, share: &ShareInfo) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let resource = guard
            .resources
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("resource {id}")))?;
        resource.url = share.url.clone();
        resource.share_id = share.share_id.clone();
        resource.pwd_id = share.pwd_id.clone();
        resource.expired_type = share.expired_type;
        resource.expired_at = share.expired_at;
        Ok(())
    }

    // ── Dispatch journal ──────────────────────────────────────────────────────

    async fn append_event(&self, event: &DispatchEvent) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.events.push(event.clone());
        Ok(())
    }

    async fn list_events(&self, limit: u32) -> Result<Vec<DispatchEvent>, StoreError> {
        let guard = self.inner.read().await;
        let start = guard.events.len().saturating_sub(limit as usize);
        Ok(guard.events[start..].to_vec())
    }
}
