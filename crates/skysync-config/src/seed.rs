use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use skysync_domain::{DriveType, DstMeta, ExpiredType, SourceDef, SourceKind, Speed, SrcMeta, SyncMethod};
use skysync_rules::TemplateKind;
use skysync_store::{DriveAccount, Resource, RuleTemplate, SyncConfig, SyncStore};
use tracing::info;

use crate::error::ConfigError;

// ── Raw YAML shapes ───────────────────────────────────────────────────────────

/// A declarative seed document: accounts, rule templates, sync configs, and
/// catalogued resources to upsert into the store. This is the file-driven way
/// to populate a deployment that has no management API in front of it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub accounts: Vec<RawAccount>,
    #[serde(default)]
    pub templates: Vec<RawTemplate>,
    #[serde(default)]
    pub configs: Vec<RawConfig>,
    #[serde(default)]
    pub resources: Vec<RawResource>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawAccount {
    /// Local handle other seed entries use to reference this account.
    #[serde(rename = "ref")]
    pub handle: String,
    #[serde(rename = "type")]
    pub kind: DriveType,
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    pub cookies: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTemplate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    #[serde(default)]
    pub rules: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Existing config id to update; omitted means insert.
    #[serde(default)]
    pub id: Option<i64>,
    /// `ref` of an account in this file.
    pub account: String,
    pub src_path: String,
    pub source_type: SourceKind,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub ext_params: Value,
    pub dst_path: String,
    #[serde(default)]
    pub dst_file_id: String,
    pub method: SyncMethod,
    /// Falls back to the deployment's `sync.default_speed` when omitted.
    #[serde(default)]
    pub speed: Option<Speed>,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exclude_template: Option<String>,
    #[serde(default)]
    pub rename_template: Option<String>,
    #[serde(default)]
    pub remark: String,
    #[serde(default = "default_enable")]
    pub enable: bool,
}

fn default_enable() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawResource {
    #[serde(default)]
    pub id: Option<i64>,
    pub account: String,
    pub title: String,
    pub file_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub expired_type: i64,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub accounts: u32,
    pub templates: u32,
    pub configs: u32,
    pub resources: u32,
}

// ── Loading & applying ────────────────────────────────────────────────────────

pub fn load_seed(path: &Path) -> Result<SeedFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })
}

fn seed_err(label: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Seed { path: label.to_string(), message: message.into() }
}

/// Upsert everything in `seed` into the store, in dependency order.
///
/// Accounts are matched by `(type, user_id)`, templates by their unique name;
/// configs and resources insert unless an explicit `id` is given.
pub async fn apply_seed(
    store: &Arc<dyn SyncStore>,
    seed: &SeedFile,
    label: &str,
    default_speed: Speed,
) -> Result<SeedSummary, ConfigError> {
    let mut summary = SeedSummary::default();

    let existing_accounts = store.list_accounts(false).await?;
    let mut account_ids: HashMap<String, (i64, DriveType)> = HashMap::new();
    for raw in &seed.accounts {
        let matched = existing_accounts
            .iter()
            .find(|a| a.kind == raw.kind && a.user_id == raw.user_id);
        let account = DriveAccount {
            id: matched.map_or(0, |a| a.id),
            kind: raw.kind,
            user_id: raw.user_id.clone(),
            username: raw.username.clone(),
            cookies: raw.cookies.clone(),
            avatar_url: matched.map_or_else(String::new, |a| a.avatar_url.clone()),
            quota: matched.map_or(0, |a| a.quota),
            used: matched.map_or(0, |a| a.used),
            is_vip: matched.is_some_and(|a| a.is_vip),
            is_supervip: matched.is_some_and(|a| a.is_supervip),
            is_valid: true,
        };
        let id = store.upsert_account(&account).await?;
        account_ids.insert(raw.handle.clone(), (id, raw.kind));
        summary.accounts += 1;
    }

    let mut template_ids: HashMap<String, i64> = HashMap::new();
    for raw in &seed.templates {
        let template = RuleTemplate {
            id: 0,
            template_name: raw.name.clone(),
            kind: raw.kind,
            is_system: false,
            is_active: true,
            rule_config: serde_json::json!({ "rules": raw.rules }),
            usage_count: 0,
        };
        let id = store.upsert_template(&template).await?;
        template_ids.insert(raw.name.clone(), id);
        summary.templates += 1;
    }

    for raw in &seed.configs {
        let (account_id, kind) = *account_ids
            .get(&raw.account)
            .ok_or_else(|| seed_err(label, format!("config references unknown account '{}'", raw.account)))?;
        let source = SourceDef {
            source: raw.source_type,
            source_id: raw.source_id.clone(),
            file_path: raw.src_path.clone(),
            ext_params: raw.ext_params.clone(),
        };
        source
            .validate()
            .map_err(|e| seed_err(label, e.to_string()))?;

        let lookup = |name: &Option<String>| -> Result<Option<i64>, ConfigError> {
            name.as_ref()
                .map(|n| {
                    template_ids
                        .get(n)
                        .copied()
                        .ok_or_else(|| seed_err(label, format!("unknown template '{n}'")))
                })
                .transpose()
        };

        let config = SyncConfig {
            id: raw.id.unwrap_or(0),
            enable: raw.enable,
            kind,
            account_id,
            src_path: raw.src_path.clone(),
            src_meta: SrcMeta {
                source_type: raw.source_type,
                source_id: raw.source_id.clone(),
                ext_params: raw.ext_params.clone(),
            },
            dst_path: raw.dst_path.clone(),
            dst_meta: DstMeta { file_id: raw.dst_file_id.clone() },
            method: raw.method,
            speed: raw.speed.unwrap_or(default_speed),
            cron: raw.cron.clone(),
            last_sync: None,
            end_time: raw.end_time,
            exclude_template_id: lookup(&raw.exclude_template)?,
            rename_template_id: lookup(&raw.rename_template)?,
            remark: raw.remark.clone(),
        };
        store.upsert_config(&config).await?;
        summary.configs += 1;
    }

    for raw in &seed.resources {
        let (account_id, _) = *account_ids
            .get(&raw.account)
            .ok_or_else(|| seed_err(label, format!("resource references unknown account '{}'", raw.account)))?;
        // day counts are validated here, at the schema boundary
        let expired = ExpiredType::from_days(raw.expired_type)
            .map_err(|e| seed_err(label, e.to_string()))?;
        let resource = Resource {
            id: raw.id.unwrap_or(0),
            account_id,
            title: raw.title.clone(),
            file_id: raw.file_id.clone(),
            url: raw.url.clone(),
            share_id: String::new(),
            pwd_id: String::new(),
            password: raw.password.clone(),
            expired_type: expired.days(),
            expired_at: raw.expired_at,
            status: 1,
        };
        store.upsert_resource(&resource).await?;
        summary.resources += 1;
    }

    info!(
        accounts = summary.accounts,
        templates = summary.templates,
        configs = summary.configs,
        resources = summary.resources,
        "seed applied"
    );
    Ok(summary)
}
