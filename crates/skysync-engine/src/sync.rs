use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use skysync_client::{
    ClientError, ClientRegistry, DriveClient, FileExtEntry, ListDiskRequest, ListShareRequest,
    MkdirRequest, RemoveRequest, TransferRequest,
};
use skysync_domain::{FileInfo, SourceDef, Speed, SyncMethod, TargetDef};
use skysync_rules::{compile_exclusions, compile_renames, ItemFilter, RenameRule, TemplateKind};
use skysync_store::{ItemStatus, NewTaskItem, OpKind, SyncStore, TaskStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::policy::{ErrorClass, ErrorPolicy, PolicyAction};
use crate::report::{SyncOutcome, SyncStats};

/// Engine-level knobs; per-job settings come from the configuration row.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_depth: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

/// Run one sync job for `config_id`.
///
/// Never fails: every outcome, including setup failures, is returned as a
/// [`SyncOutcome`] and mirrored into the task audit rows when a task exists.
pub async fn execute_sync(
    config_id: i64,
    store: Arc<dyn SyncStore>,
    registry: &ClientRegistry,
    settings: &EngineSettings,
    cancel: CancellationToken,
) -> SyncOutcome {
    let started = Instant::now();

    let config = match store.get_config(config_id).await {
        Ok(Some(config)) => config,
        Ok(None) => return SyncOutcome::failed(config_id, None, "sync config not found"),
        Err(e) => return SyncOutcome::failed(config_id, None, format!("load config: {e}")),
    };
    if !config.enable {
        return SyncOutcome::failed(config_id, None, "sync config is disabled");
    }

    // Past-deadline configs complete without work rather than erroring.
    if let Some(end_time) = config.end_time {
        if Utc::now() > end_time {
            return SyncOutcome {
                success: true,
                config_id,
                task_id: None,
                stats: SyncStats::default(),
                error: None,
                elapsed_secs: 0,
                message: Some(format!("deadline {end_time} has passed")),
            };
        }
    }

    let account = match store.get_account(config.account_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return SyncOutcome::failed(
                config_id,
                None,
                format!("drive account {} not found", config.account_id),
            )
        }
        Err(e) => return SyncOutcome::failed(config_id, None, format!("load account: {e}")),
    };
    if account.cookies.trim().is_empty() {
        return SyncOutcome::failed(
            config_id,
            None,
            format!("drive account {} has no credentials", account.id),
        );
    }

    let source = config.source_def();
    if let Err(e) = source.validate() {
        return SyncOutcome::failed(config_id, None, e.to_string());
    }
    let target = config.target_def();

    let task_id = match store.create_task(config_id, Utc::now()).await {
        Ok(id) => id,
        Err(e) => return SyncOutcome::failed(config_id, None, format!("create task: {e}")),
    };

    // The dedup fence: last_sync advances before any provider call so a
    // concurrent dispatcher tick sees this config as already taken.
    if let Err(e) = store.touch_last_sync(config_id, Utc::now()).await {
        let msg = format!("update last_sync: {e}");
        finalize(&store, task_id, TaskStatus::Failed, 0, &SyncStats::default(), Some(msg.clone()))
            .await;
        return SyncOutcome::failed(config_id, Some(task_id), msg);
    }

    let filter = load_filter(&store, config.exclude_template_id).await;
    let renames = load_renames(&store, config.rename_template_id).await;

    let client = match registry.connect(config.kind, &account.cookies) {
        Ok(client) => client,
        Err(e) => {
            if matches!(e, ClientError::Auth(_)) {
                if let Err(mark) = store.set_account_validity(account.id, false).await {
                    error!(account_id = account.id, error = %mark, "failed to invalidate account");
                }
            }
            let msg = format!("connect {}: {e}", config.kind);
            finalize(&store, task_id, TaskStatus::Failed, 0, &SyncStats::default(), Some(msg.clone()))
                .await;
            return SyncOutcome::failed(config_id, Some(task_id), msg);
        }
    };

    info!(
        config_id,
        task_id,
        method = %config.method,
        src = %source.file_path,
        dst = %target.file_path,
        "starting sync"
    );

    let mut runner = SyncRunner {
        client,
        store: store.clone(),
        task_id,
        source,
        method: config.method,
        speed: config.speed,
        filter,
        renames,
        max_depth: settings.max_depth,
        cancel: cancel.clone(),
        stats: SyncStats::default(),
        policy: ErrorPolicy::new(),
        aborted: false,
    };

    match config.method {
        SyncMethod::Overwrite => runner.overwrite(&target).await,
        _ => {
            let src_path = runner.source.file_path.clone();
            runner
                .sync_with_have(src_path, target.file_path.clone(), target.file_id.clone(), 0)
                .await
        }
    }

    let stats = runner.stats;
    let elapsed = started.elapsed().as_secs() as i64;
    let cancelled = cancel.is_cancelled();
    let (status, err_msg) = if cancelled {
        (TaskStatus::Failed, Some("cancelled".to_string()))
    } else if stats.errors.is_empty() {
        (TaskStatus::Completed, None)
    } else {
        (TaskStatus::Failed, stats.first_error())
    };

    finalize(&store, task_id, status, elapsed, &stats, err_msg.clone()).await;
    info!(
        config_id,
        task_id,
        status = %status,
        transferred = stats.files_transferred,
        skipped = stats.files_skipped,
        deleted = stats.files_deleted,
        errors = stats.errors.len(),
        "sync finished"
    );

    SyncOutcome {
        success: status == TaskStatus::Completed,
        config_id,
        task_id: Some(task_id),
        stats,
        error: err_msg,
        elapsed_secs: elapsed,
        message: None,
    }
}

async fn finalize(
    store: &Arc<dyn SyncStore>,
    task_id: i64,
    status: TaskStatus,
    dura_time: i64,
    stats: &SyncStats,
    err_msg: Option<String>,
) {
    if let Err(e) = store
        .finish_task(task_id, status, dura_time, stats.counters(), err_msg)
        .await
    {
        error!(task_id, error = %e, "failed to finalize sync task");
    }
}

async fn load_filter(store: &Arc<dyn SyncStore>, template_id: Option<i64>) -> Option<ItemFilter> {
    let id = template_id?;
    match store.get_template(id).await {
        Ok(Some(template))
            if template.kind == TemplateKind::Exclusion && template.is_active =>
        {
            if let Err(e) = store.bump_template_usage(id).await {
                warn!(template_id = id, error = %e, "usage bump failed");
            }
            let filter = compile_exclusions(&template.rule_config);
            (!filter.is_empty()).then_some(filter)
        }
        Ok(_) => {
            warn!(template_id = id, "exclusion template missing, inactive, or wrong type");
            None
        }
        Err(e) => {
            warn!(template_id = id, error = %e, "exclusion template load failed");
            None
        }
    }
}

async fn load_renames(store: &Arc<dyn SyncStore>, template_id: Option<i64>) -> Vec<RenameRule> {
    let Some(id) = template_id else { return Vec::new() };
    match store.get_template(id).await {
        Ok(Some(template)) if template.kind == TemplateKind::Rename && template.is_active => {
            if let Err(e) = store.bump_template_usage(id).await {
                warn!(template_id = id, error = %e, "usage bump failed");
            }
            compile_renames(&template.rule_config)
        }
        Ok(_) => {
            warn!(template_id = id, "rename template missing, inactive, or wrong type");
            Vec::new()
        }
        Err(e) => {
            warn!(template_id = id, error = %e, "rename template load failed");
            Vec::new()
        }
    }
}

// ── Level maps ────────────────────────────────────────────────────────────────

/// One listed entry, keyed for the diff.
#[derive(Debug, Clone)]
struct LevelEntry {
    /// Canonical key: comparison name, `/`-suffixed for folders.
    key: String,
    /// Actual provider-side name.
    name: String,
    file_id: String,
    is_folder: bool,
    size: u64,
    ext: Value,
}

/// A single directory level in listing order, with canonical-key lookup.
#[derive(Debug, Default)]
struct Level {
    entries: Vec<LevelEntry>,
    index: HashMap<String, usize>,
}

impl Level {
    fn get(&self, key: &str) -> Option<&LevelEntry> {
        self.index.get(key).map(|i| &self.entries[*i])
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }
}

/// A file queued for one batched transfer.
#[derive(Debug, Clone)]
struct TransferItem {
    name: String,
    size: u64,
    file_id: String,
    ext: Value,
}

fn join_path(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

// ── SyncRunner ────────────────────────────────────────────────────────────────

/// Walks source and target trees for one job, emitting batched provider
/// operations and audit rows. Sequential within the job; the dispatcher
/// provides cross-job concurrency.
struct SyncRunner {
    client: Arc<dyn DriveClient>,
    store: Arc<dyn SyncStore>,
    task_id: i64,
    source: SourceDef,
    method: SyncMethod,
    speed: Speed,
    filter: Option<ItemFilter>,
    renames: Vec<RenameRule>,
    max_depth: u32,
    cancel: CancellationToken,
    stats: SyncStats,
    policy: ErrorPolicy,
    aborted: bool,
}

impl SyncRunner {
    fn stopped(&self) -> bool {
        self.aborted || self.cancel.is_cancelled()
    }

    /// Comparison name: the first matching name-scope rename, applied to both
    /// sides of the diff so an un-renamable provider copy stays idempotent.
    fn canonical_name(&self, name: &str) -> String {
        for rule in &self.renames {
            if let Some(renamed) = rule.apply_to_name(name) {
                return renamed;
            }
        }
        name.to_string()
    }

    fn build_level(&self, files: Vec<FileInfo>) -> Level {
        let mut level = Level::default();
        for file in files {
            if let Some(filter) = &self.filter {
                if filter.should_exclude(&file) {
                    debug!(name = %file.file_name, "excluded by filter");
                    continue;
                }
            }
            let canonical = self.canonical_name(&file.file_name);
            let key = if file.is_folder { format!("{canonical}/") } else { canonical };
            let entry = LevelEntry {
                key: key.clone(),
                name: file.file_name,
                file_id: file.file_id,
                is_folder: file.is_folder,
                size: if file.is_folder { 0 } else { file.file_size },
                ext: file.file_ext,
            };
            match level.index.get(&key) {
                Some(&i) => level.entries[i] = entry,
                None => {
                    level.index.insert(key, level.entries.len());
                    level.entries.push(entry);
                }
            }
        }
        level
    }

    async fn list_source_level(&self, path: &str) -> Result<Level, ClientError> {
        let files = self
            .client
            .list_share(&ListShareRequest {
                source: self.source.source,
                source_id: self.source.source_id.clone(),
                file_path: path.to_string(),
            })
            .await?;
        Ok(self.build_level(files))
    }

    async fn list_target_level(&self, path: &str, file_id: &str) -> Result<Level, ClientError> {
        let files = self
            .client
            .list_disk(&ListDiskRequest {
                file_path: path.to_string(),
                file_id: (!file_id.is_empty()).then(|| file_id.to_string()),
                desc: false,
            })
            .await?;
        Ok(self.build_level(files))
    }

    // ── Recursive walk ────────────────────────────────────────────────────────

    /// Target directory exists: diff both sides, transfer missing/mismatched
    /// files, recurse into folders, and (for `full`) delete strays.
    fn sync_with_have(
        &mut self,
        src_path: String,
        dst_path: String,
        dst_id: String,
        depth: u32,
    ) -> BoxFuture<'_, ()> {
        async move {
            if self.stopped() {
                return;
            }
            if depth >= self.max_depth {
                warn!(task_id = self.task_id, depth, "max recursion depth reached, stopping");
                return;
            }

            let src_level = match self.list_source_level(&src_path).await {
                Ok(level) => level,
                Err(e) => {
                    self.stats.errors.push(format!("scan source {src_path}: {e}"));
                    return;
                }
            };
            let dst_level = match self.list_target_level(&dst_path, &dst_id).await {
                Ok(level) => level,
                Err(e) => {
                    self.stats.errors.push(format!("scan target {dst_path}: {e}"));
                    return;
                }
            };

            let mut batch: Vec<TransferItem> = Vec::new();
            for entry in src_level.entries.clone() {
                if self.stopped() {
                    return;
                }
                if entry.is_folder {
                    let sub_src = join_path(&src_path, &entry.name);
                    let sub_dst = join_path(&dst_path, &entry.name);
                    match dst_level.get(&entry.key) {
                        None => {
                            self.sync_without_have(sub_src, sub_dst, dst_id.clone(), depth + 1)
                                .await
                        }
                        Some(existing) => {
                            let sub_id = existing.file_id.clone();
                            self.sync_with_have(sub_src, sub_dst, sub_id, depth + 1).await
                        }
                    }
                } else {
                    self.stats.files_processed += 1;
                    match dst_level.get(&entry.key) {
                        Some(existing) if existing.size == entry.size => {
                            self.stats.files_skipped += 1;
                        }
                        _ => batch.push(TransferItem {
                            name: entry.name,
                            size: entry.size,
                            file_id: entry.file_id,
                            ext: entry.ext,
                        }),
                    }
                }
            }

            if !batch.is_empty() {
                self.transfer_batch(&batch, &src_path, &dst_path, &dst_id).await;
                if self.stopped() {
                    return;
                }
            }

            if self.method == SyncMethod::Full {
                let doomed: Vec<LevelEntry> = dst_level
                    .entries
                    .iter()
                    .filter(|t| !src_level.contains(&t.key))
                    .cloned()
                    .collect();
                if !doomed.is_empty() {
                    self.delete_batch(&doomed, &dst_path).await;
                }
            }
        }
        .boxed()
    }

    /// Target directory is absent: create it, then mirror the source level
    /// into it.
    fn sync_without_have(
        &mut self,
        src_path: String,
        dst_path: String,
        parent_id: String,
        depth: u32,
    ) -> BoxFuture<'_, ()> {
        async move {
            if self.stopped() {
                return;
            }
            if depth >= self.max_depth {
                warn!(task_id = self.task_id, depth, "max recursion depth reached, stopping");
                return;
            }

            let dir_name = dst_path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            let created = match self
                .client
                .mkdir(&MkdirRequest {
                    file_path: dst_path.clone(),
                    parent_id: (!parent_id.is_empty()).then(|| parent_id.clone()),
                    file_name: Some(dir_name.clone()),
                    return_if_exist: true,
                })
                .await
            {
                Ok(dir) => dir,
                Err(e) => {
                    self.stats.errors.push(format!("create directory {dst_path}: {e}"));
                    return;
                }
            };
            self.stats.folder_created += 1;
            self.record_item(OpKind::Create, &src_path, &dst_path, &dir_name, 0, ItemStatus::Completed, None)
                .await;

            let src_level = match self.list_source_level(&src_path).await {
                Ok(level) => level,
                Err(e) => {
                    self.stats.errors.push(format!("scan source {src_path}: {e}"));
                    return;
                }
            };

            let mut batch: Vec<TransferItem> = Vec::new();
            for entry in src_level.entries {
                if self.stopped() {
                    return;
                }
                if entry.is_folder {
                    let sub_src = join_path(&src_path, &entry.name);
                    let sub_dst = join_path(&dst_path, &entry.name);
                    self.sync_without_have(sub_src, sub_dst, created.file_id.clone(), depth + 1)
                        .await;
                } else {
                    self.stats.files_processed += 1;
                    batch.push(TransferItem {
                        name: entry.name,
                        size: entry.size,
                        file_id: entry.file_id,
                        ext: entry.ext,
                    });
                }
            }

            if !batch.is_empty() {
                self.transfer_batch(&batch, &src_path, &dst_path, &created.file_id).await;
            }
        }
        .boxed()
    }

    /// Overwrite: wipe the target root, then one batched transfer of every
    /// top-level source entry. Providers copy directories server-side, so no
    /// recursion happens here.
    async fn overwrite(&mut self, target: &TargetDef) {
        if self.stopped() {
            return;
        }
        let dst_level = match self.list_target_level(&target.file_path, &target.file_id).await {
            Ok(level) => level,
            Err(e) => {
                self.stats.errors.push(format!("scan target {}: {e}", target.file_path));
                return;
            }
        };
        if !dst_level.entries.is_empty() {
            self.delete_batch(&dst_level.entries, &target.file_path).await;
        }

        let src_path = self.source.file_path.clone();
        let src_level = match self.list_source_level(&src_path).await {
            Ok(level) => level,
            Err(e) => {
                self.stats.errors.push(format!("scan source {src_path}: {e}"));
                return;
            }
        };
        if src_level.entries.is_empty() {
            return;
        }

        let batch: Vec<TransferItem> = src_level
            .entries
            .into_iter()
            .map(|entry| TransferItem {
                name: entry.name,
                size: entry.size,
                file_id: entry.file_id,
                ext: entry.ext,
            })
            .collect();
        self.stats.files_processed += batch.len() as u64;
        self.transfer_batch(&batch, &src_path, &target.file_path, &target.file_id)
            .await;
    }

    // ── Batched operations ────────────────────────────────────────────────────

    /// Issue one batched transfer, retrying or aborting per the error policy.
    async fn transfer_batch(
        &mut self,
        batch: &[TransferItem],
        src_path: &str,
        dst_path: &str,
        dst_id: &str,
    ) {
        let request = TransferRequest {
            source: self.source.source,
            source_id: self.source.source_id.clone(),
            source_path: src_path.to_string(),
            target_path: dst_path.to_string(),
            target_id: (!dst_id.is_empty()).then(|| dst_id.to_string()),
            file_ids: batch.iter().map(|i| i.file_id.clone()).collect(),
            files_ext: batch
                .iter()
                .map(|i| FileExtEntry { file_id: i.file_id.clone(), file_ext: i.ext.clone() })
                .collect(),
            ext_params: self.source.ext_params.clone(),
        };

        loop {
            if self.stopped() {
                return;
            }
            let failure = match self.client.transfer(&request).await {
                Ok(true) => None,
                Ok(false) => Some((
                    ErrorClass::Transfer,
                    format!("batch transfer failed: provider rejected {} file(s)", batch.len()),
                )),
                Err(e) => Some((ErrorClass::of(&e), format!("batch transfer failed: {e}"))),
            };

            match failure {
                None => {
                    self.stats.files_transferred += batch.len() as u64;
                    for item in batch {
                        self.record_item(
                            OpKind::Copy,
                            src_path,
                            dst_path,
                            &item.name,
                            item.size,
                            ItemStatus::Completed,
                            None,
                        )
                        .await;
                    }
                    self.policy.record_success();
                    tokio::time::sleep(self.speed.transfer_pause()).await;
                    return;
                }
                Some((class, message)) => {
                    warn!(task_id = self.task_id, %message, "transfer batch failed");
                    self.stats.errors.push(message.clone());
                    for item in batch {
                        self.record_item(
                            OpKind::Copy,
                            src_path,
                            dst_path,
                            &item.name,
                            item.size,
                            ItemStatus::Failed,
                            Some(&message),
                        )
                        .await;
                    }
                    tokio::time::sleep(self.speed.transfer_pause()).await;
                    match self.policy.assess(class, self.stats.errors.len()) {
                        PolicyAction::Retry { pause } => {
                            info!(task_id = self.task_id, pause_secs = pause.as_secs(), "retrying batch");
                            tokio::time::sleep(pause).await;
                        }
                        PolicyAction::Continue => return,
                        PolicyAction::Abort { reason } => {
                            self.stats.errors.push(format!("sync aborted: {reason}"));
                            self.aborted = true;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Issue one batched delete. Delete failures are recorded but never
    /// retried and never stop the job on their own.
    async fn delete_batch(&mut self, doomed: &[LevelEntry], dst_path: &str) {
        if self.stopped() {
            return;
        }
        let request = RemoveRequest {
            file_paths: doomed.iter().map(|e| join_path(dst_path, &e.name)).collect(),
            file_ids: doomed
                .iter()
                .filter(|e| !e.file_id.is_empty())
                .map(|e| e.file_id.clone())
                .collect(),
            parent_id: None,
        };

        let failure = match self.client.remove(&request).await {
            Ok(true) => None,
            Ok(false) => Some(format!("batch delete failed: {} item(s)", doomed.len())),
            Err(e) => Some(format!("batch delete failed: {e}")),
        };

        match failure {
            None => {
                self.stats.files_deleted += doomed.len() as u64;
                for entry in doomed {
                    self.record_item(
                        OpKind::Delete,
                        "",
                        dst_path,
                        &entry.name,
                        entry.size,
                        ItemStatus::Completed,
                        None,
                    )
                    .await;
                }
            }
            Some(message) => {
                warn!(task_id = self.task_id, %message, "delete batch failed");
                self.stats.errors.push(message.clone());
                for entry in doomed {
                    self.record_item(
                        OpKind::Delete,
                        "",
                        dst_path,
                        &entry.name,
                        entry.size,
                        ItemStatus::Failed,
                        Some(&message),
                    )
                    .await;
                }
            }
        }
        tokio::time::sleep(self.speed.delete_pause()).await;
    }

    /// Append one audit row. Store failures are logged, never fatal.
    #[allow(clippy::too_many_arguments)]
    async fn record_item(
        &self,
        op: OpKind,
        src_path: &str,
        dst_path: &str,
        file_name: &str,
        file_size: u64,
        status: ItemStatus,
        err_msg: Option<&str>,
    ) {
        let item = NewTaskItem {
            task_id: self.task_id,
            op,
            src_path: src_path.to_string(),
            dst_path: dst_path.to_string(),
            file_name: file_name.to_string(),
            file_size: file_size as i64,
            status,
            err_msg: err_msg.map(str::to_string),
        };
        if let Err(e) = self.store.append_task_item(&item).await {
            error!(task_id = self.task_id, error = %e, "failed to record task item");
        }
    }
}
