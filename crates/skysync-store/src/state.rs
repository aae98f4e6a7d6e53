use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skysync_domain::{DriveType, DstMeta, SourceDef, Speed, SrcMeta, SyncMethod, TargetDef};
use skysync_rules::TemplateKind;

// ── Accounts ──────────────────────────────────────────────────────────────────

/// A stored credential bundle for one provider account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveAccount {
    pub id: i64,
    pub kind: DriveType,
    /// Provider-side user id.
    pub user_id: String,
    pub username: String,
    /// Opaque credential blob, interpreted only by the matching adapter.
    pub cookies: String,
    pub avatar_url: String,
    pub quota: i64,
    pub used: i64,
    pub is_vip: bool,
    pub is_supervip: bool,
    pub is_valid: bool,
}

// ── Sync configurations ───────────────────────────────────────────────────────

/// One sync contract: a share source, a destination folder, and how to
/// reconcile them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub id: i64,
    pub enable: bool,
    pub kind: DriveType,
    /// Owning [`DriveAccount`] id.
    pub account_id: i64,
    pub src_path: String,
    pub src_meta: SrcMeta,
    pub dst_path: String,
    pub dst_meta: DstMeta,
    pub method: SyncMethod,
    pub speed: Speed,
    pub cron: Option<String>,
    /// Advanced monotonically, and written before the sync body runs; the
    /// dispatcher's dedup fence.
    pub last_sync: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub exclude_template_id: Option<i64>,
    pub rename_template_id: Option<i64>,
    pub remark: String,
}

impl SyncConfig {
    pub fn source_def(&self) -> SourceDef {
        SourceDef {
            source: self.src_meta.source_type,
            source_id: self.src_meta.source_id.clone(),
            file_path: self.src_path.clone(),
            ext_params: self.src_meta.ext_params.clone(),
        }
    }

    pub fn target_def(&self) -> TargetDef {
        TargetDef {
            file_path: self.dst_path.clone(),
            file_id: self.dst_meta.file_id.clone(),
        }
    }
}

// ── Rule templates ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub id: i64,
    pub template_name: String,
    pub kind: TemplateKind,
    /// System templates are immutable through the outer surfaces.
    pub is_system: bool,
    pub is_active: bool,
    /// `{"rules": [...]}`, compiled by `skysync-rules` at job start.
    pub rule_config: Value,
    pub usage_count: i64,
}

// ── Tasks & task items ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Audit header for one execution of a [`SyncConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    pub id: i64,
    pub config_id: i64,
    pub start_time: DateTime<Utc>,
    pub status: TaskStatus,
    /// Wall-clock duration in seconds.
    pub dura_time: i64,
    /// JSON-encoded counters from the engine's stats.
    pub task_num: Value,
    pub err_msg: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Copy,
    Delete,
    Create,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Copy => write!(f, "copy"),
            OpKind::Delete => write!(f, "delete"),
            OpKind::Create => write!(f, "create"),
        }
    }
}

impl std::str::FromStr for OpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copy" => Ok(OpKind::Copy),
            "delete" => Ok(OpKind::Delete),
            "create" => Ok(OpKind::Create),
            other => Err(format!("unknown op kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Completed => write!(f, "completed"),
            ItemStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(ItemStatus::Completed),
            "failed" => Ok(ItemStatus::Failed),
            other => Err(format!("unknown item status: {other}")),
        }
    }
}

/// Audit row for one emitted provider operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTaskItem {
    pub id: i64,
    pub task_id: i64,
    pub op: OpKind,
    pub src_path: String,
    pub dst_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub status: ItemStatus,
    pub err_msg: Option<String>,
}

/// Insert form of a task item; the store assigns the id (append order).
#[derive(Debug, Clone, PartialEq)]
pub struct NewTaskItem {
    pub task_id: i64,
    pub op: OpKind,
    pub src_path: String,
    pub dst_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub status: ItemStatus,
    pub err_msg: Option<String>,
}

// ── Resources ─────────────────────────────────────────────────────────────────

/// A catalogued shared resource whose share link the maintenance worker keeps
/// alive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub account_id: i64,
    pub title: String,
    pub file_id: String,
    pub url: String,
    pub share_id: String,
    pub pwd_id: String,
    pub password: String,
    /// Day count; 0 means permanent (never refreshed).
    pub expired_type: i64,
    pub expired_at: Option<DateTime<Utc>>,
    /// 1 = active; anything else is skipped by maintenance.
    pub status: i32,
}

// ── Dispatch journal ──────────────────────────────────────────────────────────

/// Journal of scheduler-level outcomes. Job-level detail lives in
/// `sync_task` / `sync_task_item`; this records what the dispatcher decided
/// and why, including failures that never reached a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DispatchEvent {
    TickCompleted {
        at: DateTime<Utc>,
        checked: u32,
        executed: u32,
        failed: u32,
        skipped: u32,
    },
    ConfigSkipped {
        at: DateTime<Utc>,
        config_id: i64,
        reason: String,
    },
    ConfigFailed {
        at: DateTime<Utc>,
        config_id: i64,
        message: String,
    },
    JobFinished {
        at: DateTime<Utc>,
        config_id: i64,
        task_id: Option<i64>,
        success: bool,
        message: Option<String>,
    },
}
