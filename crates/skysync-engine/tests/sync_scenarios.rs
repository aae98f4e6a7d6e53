//! End-to-end engine scenarios against the in-memory drive and store.

use std::sync::Arc;

use serde_json::{json, Value};
use skysync_client::{ClientError, ClientRegistry, DriveClient, MemDrive};
use skysync_domain::{DriveType, DstMeta, SourceKind, Speed, SrcMeta, SyncMethod};
use skysync_engine::{execute_sync, EngineSettings, SyncOutcome};
use skysync_rules::TemplateKind;
use skysync_store::{
    DriveAccount, InMemoryStore, OpKind, RuleTemplate, SyncConfig, SyncStore, TaskStatus,
};
use tokio_util::sync::CancellationToken;

struct Harness {
    drive: Arc<MemDrive>,
    store: Arc<InMemoryStore>,
    registry: ClientRegistry,
    config_id: i64,
}

impl Harness {
    async fn new(method: SyncMethod) -> Self {
        Self::build(method, Speed::Fast, None, None).await
    }

    async fn build(
        method: SyncMethod,
        speed: Speed,
        exclude_rules: Option<Value>,
        rename_rules: Option<Value>,
    ) -> Self {
        let drive = Arc::new(MemDrive::new());
        let store = Arc::new(InMemoryStore::new());

        let account_id = store
            .upsert_account(&DriveAccount {
                id: 0,
                kind: DriveType::Quark,
                user_id: "u1".into(),
                username: "tester".into(),
                cookies: "__pus=x".into(),
                avatar_url: String::new(),
                quota: 0,
                used: 0,
                is_vip: false,
                is_supervip: false,
                is_valid: true,
            })
            .await
            .unwrap();

        let mut exclude_template_id = None;
        if let Some(rules) = exclude_rules {
            exclude_template_id = Some(
                store
                    .upsert_template(&RuleTemplate {
                        id: 0,
                        template_name: "exclude".into(),
                        kind: TemplateKind::Exclusion,
                        is_system: false,
                        is_active: true,
                        rule_config: rules,
                        usage_count: 0,
                    })
                    .await
                    .unwrap(),
            );
        }
        let mut rename_template_id = None;
        if let Some(rules) = rename_rules {
            rename_template_id = Some(
                store
                    .upsert_template(&RuleTemplate {
                        id: 0,
                        template_name: "rename".into(),
                        kind: TemplateKind::Rename,
                        is_system: false,
                        is_active: true,
                        rule_config: rules,
                        usage_count: 0,
                    })
                    .await
                    .unwrap(),
            );
        }

        let config_id = store
            .upsert_config(&SyncConfig {
                id: 0,
                enable: true,
                kind: DriveType::Quark,
                account_id,
                src_path: "/root".into(),
                src_meta: SrcMeta {
                    source_type: SourceKind::Link,
                    source_id: "https://pan.quark.cn/s/mem".into(),
                    ext_params: Value::Null,
                },
                dst_path: "/dst".into(),
                dst_meta: DstMeta { file_id: String::new() },
                method,
                speed,
                cron: None,
                last_sync: None,
                end_time: None,
                exclude_template_id,
                rename_template_id,
                remark: String::new(),
            })
            .await
            .unwrap();

        let mut registry = ClientRegistry::new();
        let shared = drive.clone();
        registry.register(DriveType::Quark, move |_| {
            Ok(shared.clone() as Arc<dyn DriveClient>)
        });

        Self { drive, store, registry, config_id }
    }

    async fn run(&self) -> SyncOutcome {
        self.run_with(&EngineSettings::default()).await
    }

    async fn run_with(&self, settings: &EngineSettings) -> SyncOutcome {
        execute_sync(
            self.config_id,
            self.store.clone() as Arc<dyn SyncStore>,
            &self.registry,
            settings,
            CancellationToken::new(),
        )
        .await
    }

    /// Target-side `(relative_path, size)` of files under `/dst`.
    fn target_files(&self) -> Vec<(String, u64)> {
        self.drive
            .disk_snapshot()
            .into_iter()
            .filter(|(path, _, is_folder)| !is_folder && path.starts_with("/dst/"))
            .map(|(path, size, _)| (path["/dst".len()..].to_string(), size))
            .collect()
    }
}

// ── Seed scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_incremental_copy() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_share_file("/root/b/c.txt", 20);
    h.drive.add_disk_folder("/dst");

    let outcome = h.run().await;
    assert!(outcome.success, "errors: {:?}", outcome.stats.errors);
    assert_eq!(outcome.stats.folder_created, 1);
    assert_eq!(outcome.stats.files_transferred, 2);
    assert_eq!(outcome.stats.files_deleted, 0);
    assert_eq!(outcome.stats.files_skipped, 0);
    assert_eq!(outcome.stats.files_processed, 2);
    assert_eq!(
        h.target_files(),
        vec![("/a.txt".to_string(), 10), ("/b/c.txt".to_string(), 20)]
    );

    let task = h.store.get_task(outcome.task_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.task_num["files_transferred"], 2);
}

#[tokio::test]
async fn second_run_is_a_noop() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_share_file("/root/b/c.txt", 20);
    h.drive.add_disk_folder("/dst");

    assert!(h.run().await.success);
    let second = h.run().await;
    assert!(second.success);
    assert_eq!(second.stats.files_transferred, 0);
    assert_eq!(second.stats.folder_created, 0);
    assert_eq!(second.stats.files_deleted, 0);
    assert_eq!(second.stats.files_skipped, 2);
}

#[tokio::test]
async fn full_deletes_strays() {
    let h = Harness::new(SyncMethod::Full).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_disk_file("/dst/a.txt", 10);
    h.drive.add_disk_file("/dst/stale.txt", 5);

    let outcome = h.run().await;
    assert!(outcome.success, "errors: {:?}", outcome.stats.errors);
    assert_eq!(outcome.stats.files_transferred, 0);
    assert_eq!(outcome.stats.files_skipped, 1);
    assert_eq!(outcome.stats.files_deleted, 1);
    // convergence: target now equals source by name+size
    assert_eq!(h.target_files(), vec![("/a.txt".to_string(), 10)]);
}

#[tokio::test]
async fn size_mismatch_triggers_transfer() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_file("/root/a.txt", 12);
    h.drive.add_disk_file("/dst/a.txt", 10);

    let outcome = h.run().await;
    assert!(outcome.success);
    assert_eq!(outcome.stats.files_transferred, 1);
    assert_eq!(outcome.stats.files_skipped, 0);
    assert_eq!(h.target_files(), vec![("/a.txt".to_string(), 12)]);
}

#[tokio::test]
async fn overwrite_resets_the_root_with_two_batches() {
    let h = Harness::new(SyncMethod::Overwrite).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_share_folder("/root/b");
    h.drive.add_share_file("/root/b/nested.txt", 7);
    h.drive.add_disk_folder("/dst/x");
    h.drive.add_disk_file("/dst/y.txt", 3);

    let outcome = h.run().await;
    assert!(outcome.success, "errors: {:?}", outcome.stats.errors);

    // exactly one batched delete and one batched transfer at the root
    assert_eq!(h.drive.remove_calls().len(), 1);
    assert_eq!(h.drive.transfer_calls().len(), 1);
    assert_eq!(outcome.stats.folder_created, 0);

    let top_level: Vec<String> = h
        .drive
        .disk_snapshot()
        .into_iter()
        .filter(|(path, ..)| {
            path.starts_with("/dst/") && !path["/dst/".len()..].contains('/')
        })
        .map(|(path, ..)| path)
        .collect();
    assert_eq!(top_level, vec!["/dst/a.txt", "/dst/b"]);
    assert_eq!(
        h.target_files(),
        vec![("/a.txt".to_string(), 10), ("/b/nested.txt".to_string(), 7)]
    );
}

// ── Invariants ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transfers_keep_token_correspondence() {
    let h = Harness::new(SyncMethod::Incremental).await;
    for i in 0..12 {
        h.drive.add_share_file(&format!("/root/f{i:02}.bin"), 100 + i);
    }
    h.drive.add_disk_folder("/dst");

    let outcome = h.run().await;
    assert!(outcome.success);
    let calls = h.drive.transfer_calls();
    assert!(!calls.is_empty());
    for call in calls {
        assert_eq!(call.file_ids.len(), call.files_ext.len());
        for (id, ext) in call.file_ids.iter().zip(&call.files_ext) {
            assert_eq!(*id, ext.file_id);
        }
    }
}

#[tokio::test]
async fn task_items_are_appended_in_emission_order() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_share_file("/root/b/c.txt", 20);
    h.drive.add_disk_folder("/dst");

    let outcome = h.run().await;
    let items = h.store.list_task_items(outcome.task_id.unwrap()).await.unwrap();

    // depth-first declaration order: the subtree of b/ lands before the
    // current level's batched transfer of a.txt
    let summary: Vec<(OpKind, String)> =
        items.iter().map(|i| (i.op, i.file_name.clone())).collect();
    assert_eq!(
        summary,
        vec![
            (OpKind::Create, "b".to_string()),
            (OpKind::Copy, "c.txt".to_string()),
            (OpKind::Copy, "a.txt".to_string()),
        ]
    );
    assert!(items.windows(2).all(|w| w[0].id < w[1].id), "ids must be monotonic");
}

#[tokio::test]
async fn excluded_items_never_reach_task_items() {
    let rules = json!({
        "rules": [
            {"pattern": ".tmp", "target": "name", "item_type": "file",
             "mode": "ends_with", "case_sensitive": false},
        ]
    });
    let h = Harness::build(SyncMethod::Full, Speed::Fast, Some(rules), None).await;
    h.drive.add_share_file("/root/keep.txt", 10);
    h.drive.add_share_file("/root/junk.tmp", 99);
    h.drive.add_disk_folder("/dst");
    // an excluded stray on the target must also survive a full sync
    h.drive.add_disk_file("/dst/local.tmp", 1);

    let outcome = h.run().await;
    assert!(outcome.success, "errors: {:?}", outcome.stats.errors);
    assert_eq!(outcome.stats.files_transferred, 1);
    assert_eq!(outcome.stats.files_deleted, 0);

    let items = h.store.list_task_items(outcome.task_id.unwrap()).await.unwrap();
    assert!(items.iter().all(|i| !i.file_name.ends_with(".tmp")));
    assert!(h.drive.disk_snapshot().iter().any(|(p, ..)| p == "/dst/local.tmp"));
}

#[tokio::test]
async fn renamed_names_compare_equal_across_sides() {
    let rules = json!({
        "rules": [
            {"match_regex": r"^\[ads\]", "replace_string": "", "target_scope": "name"},
        ]
    });
    let h = Harness::build(SyncMethod::Incremental, Speed::Fast, None, Some(rules)).await;
    h.drive.add_share_file("/root/[ads]movie.mkv", 9);
    h.drive.add_disk_file("/dst/movie.mkv", 9);

    let outcome = h.run().await;
    assert!(outcome.success);
    assert_eq!(outcome.stats.files_transferred, 0);
    assert_eq!(outcome.stats.files_skipped, 1);
}

#[tokio::test]
async fn last_sync_fence_precedes_provider_work() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_disk_folder("/dst");

    let outcome = h.run().await;
    let config = h.store.get_config(h.config_id).await.unwrap().unwrap();
    let task = h.store.get_task(outcome.task_id.unwrap()).await.unwrap().unwrap();
    assert!(config.last_sync.unwrap() >= task.start_time);
}

// ── Boundary behaviours ───────────────────────────────────────────────────────

#[tokio::test]
async fn empty_source_directory_still_creates_the_leaf() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_folder("/root/empty");
    h.drive.add_disk_folder("/dst");

    let outcome = h.run().await;
    assert!(outcome.success);
    assert_eq!(outcome.stats.folder_created, 1);
    assert_eq!(outcome.stats.files_transferred, 0);
    assert!(h.drive.disk_snapshot().contains(&("/dst/empty".to_string(), 0, true)));
}

#[tokio::test]
async fn recursion_stops_quietly_at_the_depth_bound() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_file("/root/l1/l2/deep.txt", 4);
    h.drive.add_disk_folder("/dst");

    let outcome = h.run_with(&EngineSettings { max_depth: 2 }).await;
    assert!(outcome.success, "depth bound is not an error: {:?}", outcome.stats.errors);
    // l1 is created at depth 1; descending into l2 would be depth 2 and stops
    assert_eq!(outcome.stats.folder_created, 1);
    assert_eq!(outcome.stats.files_transferred, 0);
}

#[tokio::test]
async fn expired_config_completes_without_a_task() {
    let h = Harness::new(SyncMethod::Incremental).await;
    let mut config = h.store.get_config(h.config_id).await.unwrap().unwrap();
    config.end_time = Some(chrono::Utc::now() - chrono::Duration::hours(1));
    h.store.upsert_config(&config).await.unwrap();

    let outcome = h.run().await;
    assert!(outcome.success);
    assert!(outcome.task_id.is_none());
    assert!(outcome.message.unwrap().contains("deadline"));
    assert!(h.store.list_tasks(Some(h.config_id), 10).await.unwrap().is_empty());
}

// ── Failure handling ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn conflicts_retry_then_abort_the_job() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_disk_folder("/dst");
    for _ in 0..3 {
        h.drive
            .fail_next_transfer(ClientError::Conflict("unfinished task pending".into()));
    }

    let outcome = h.run().await;
    assert!(!outcome.success);
    // two retries after the first failure, then the third conflict aborts
    assert_eq!(h.drive.transfer_calls().len(), 3);
    assert_eq!(outcome.stats.files_transferred, 0);
    assert!(outcome.stats.errors.iter().any(|e| e.contains("sync aborted")));

    let task = h.store.get_task(outcome.task_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.err_msg.is_some());
}

#[tokio::test(start_paused = true)]
async fn transient_failure_recovers_on_retry() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_disk_folder("/dst");
    h.drive.fail_next_transfer(ClientError::Conflict("busy".into()));

    let outcome = h.run().await;
    // the retry succeeded, but a partially failed run still marks the task
    // failed: completed means zero errors
    assert!(!outcome.success);
    assert_eq!(outcome.stats.files_transferred, 1);
    assert_eq!(outcome.stats.errors.len(), 1);
    assert_eq!(h.target_files(), vec![("/a.txt".to_string(), 10)]);

    let task = h.store.get_task(outcome.task_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn network_errors_abort_after_two() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_disk_folder("/dst");
    h.drive.fail_next_transfer(ClientError::Network("timeout".into()));
    h.drive.fail_next_transfer(ClientError::Network("timeout".into()));

    let outcome = h.run().await;
    assert!(!outcome.success);
    assert_eq!(h.drive.transfer_calls().len(), 2);
    assert!(outcome.stats.errors.iter().any(|e| e.contains("sync aborted")));
}

#[tokio::test]
async fn delete_failures_do_not_stop_the_job() {
    let h = Harness::new(SyncMethod::Full).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_disk_file("/dst/stale.txt", 5);
    h.drive
        .fail_next_remove(ClientError::NotFound("already gone".into()));

    let outcome = h.run().await;
    // the transfer side finished; the failed delete marks the task failed
    assert!(!outcome.success);
    assert_eq!(outcome.stats.files_transferred, 1);
    assert_eq!(outcome.stats.files_deleted, 0);
    assert_eq!(outcome.stats.errors.len(), 1);
}

#[tokio::test]
async fn cancellation_finalizes_the_task_as_failed() {
    let h = Harness::new(SyncMethod::Incremental).await;
    h.drive.add_share_file("/root/a.txt", 10);
    h.drive.add_disk_folder("/dst");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = execute_sync(
        h.config_id,
        h.store.clone() as Arc<dyn SyncStore>,
        &h.registry,
        &EngineSettings::default(),
        cancel,
    )
    .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("cancelled"));
    assert_eq!(outcome.stats.files_transferred, 0);
    let task = h.store.get_task(outcome.task_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.err_msg.as_deref(), Some("cancelled"));
}
