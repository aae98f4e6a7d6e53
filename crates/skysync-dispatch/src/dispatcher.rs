use std::sync::Arc;

use chrono::{Duration, Utc};
use skysync_client::ClientRegistry;
use skysync_engine::{execute_sync, EngineSettings};
use skysync_store::{DispatchEvent, SyncStore};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::schedule::{eligibility, Eligibility};

/// Dispatcher knobs; defaults match the deployment configuration surface.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Interval between scheduler passes.
    pub tick_interval: std::time::Duration,
    /// How long after a cron firing a job may still be dispatched.
    pub execution_window: Duration,
    /// Maximum concurrently running sync jobs.
    pub worker_cap: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            tick_interval: std::time::Duration::from_secs(60),
            execution_window: Duration::minutes(5),
            worker_cap: 8,
        }
    }
}

/// Per-tick accounting, mirrored into the dispatch journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub checked: u32,
    pub executed: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Periodically walks enabled configurations and submits due jobs to a
/// bounded worker pool. The `last_sync` write-fence inside the engine keeps a
/// double-fire within one execution window down to a single task.
pub struct Dispatcher {
    store: Arc<dyn SyncStore>,
    registry: Arc<ClientRegistry>,
    engine: EngineSettings,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn SyncStore>,
        registry: Arc<ClientRegistry>,
        engine: EngineSettings,
        settings: DispatcherSettings,
    ) -> Self {
        Self { store, registry, engine, settings }
    }

    /// One scheduler pass: evaluate every enabled config and run the due ones
    /// to completion.
    pub async fn tick(&self, cancel: &CancellationToken) -> TickSummary {
        let now = Utc::now();
        let mut summary = TickSummary::default();

        let configs = match self.store.list_enabled_configs().await {
            Ok(configs) => configs,
            Err(e) => {
                error!(error = %e, "dispatcher could not load configs");
                return summary;
            }
        };
        summary.checked = configs.len() as u32;

        let mut due = Vec::new();
        for config in configs {
            let Some(cron_expr) = config.cron.as_deref().filter(|c| !c.trim().is_empty()) else {
                summary.skipped += 1;
                continue;
            };
            if config.end_time.map_or(false, |end| now > end) {
                summary.skipped += 1;
                continue;
            }
            match eligibility(cron_expr, config.last_sync, now, self.settings.execution_window) {
                Ok(Eligibility::Run { prev_fire }) => {
                    debug!(config_id = config.id, %prev_fire, "config is due");
                    due.push(config.id);
                }
                Ok(Eligibility::Skip { reason }) => {
                    debug!(config_id = config.id, reason, "config skipped");
                    summary.skipped += 1;
                }
                Err(e) => {
                    warn!(config_id = config.id, error = %e, "config has a broken schedule");
                    summary.failed += 1;
                    self.journal(DispatchEvent::ConfigFailed {
                        at: now,
                        config_id: config.id,
                        message: e.to_string(),
                    })
                    .await;
                }
            }
        }

        if !due.is_empty() {
            let (executed, failed) = self.run_jobs(due, cancel).await;
            summary.executed = executed;
            summary.failed += failed;
            self.journal(DispatchEvent::TickCompleted {
                at: Utc::now(),
                checked: summary.checked,
                executed: summary.executed,
                failed: summary.failed,
                skipped: summary.skipped,
            })
            .await;
        }
        summary
    }

    /// Run due configs on the bounded worker pool and wait for all of them.
    async fn run_jobs(&self, due: Vec<i64>, cancel: &CancellationToken) -> (u32, u32) {
        let semaphore = Arc::new(Semaphore::new(self.settings.worker_cap));
        let mut jobs = JoinSet::new();
        for config_id in due {
            let store = self.store.clone();
            let registry = self.registry.clone();
            let engine = self.engine.clone();
            let semaphore = semaphore.clone();
            let job_cancel = cancel.child_token();
            jobs.spawn(async move {
                // a closed semaphore cannot happen here; treat it as cancelled
                let _permit = semaphore.acquire_owned().await;
                execute_sync(config_id, store, &registry, &engine, job_cancel).await
            });
        }

        let (mut executed, mut failed) = (0, 0);
        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(outcome) => {
                    if outcome.success {
                        executed += 1;
                    } else {
                        failed += 1;
                    }
                    info!(
                        config_id = outcome.config_id,
                        task_id = outcome.task_id,
                        success = outcome.success,
                        transferred = outcome.stats.files_transferred,
                        "job finished"
                    );
                    self.journal(DispatchEvent::JobFinished {
                        at: Utc::now(),
                        config_id: outcome.config_id,
                        task_id: outcome.task_id,
                        success: outcome.success,
                        message: outcome.error,
                    })
                    .await;
                }
                Err(e) => {
                    failed += 1;
                    error!(error = %e, "sync job panicked");
                }
            }
        }
        (executed, failed)
    }

    async fn journal(&self, event: DispatchEvent) {
        if let Err(e) = self.store.append_event(&event).await {
            error!(error = %e, "failed to journal dispatch event");
        }
    }

    /// Tick until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            tick_secs = self.settings.tick_interval.as_secs(),
            window_mins = self.settings.execution_window.num_minutes(),
            workers = self.settings.worker_cap,
            "dispatcher running"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("dispatcher stopping");
                    return;
                }
                _ = ticker.tick() => {
                    let summary = self.tick(&cancel).await;
                    debug!(
                        checked = summary.checked,
                        executed = summary.executed,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        "tick complete"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use skysync_client::{DriveClient, MemDrive};
    use skysync_domain::{DriveType, DstMeta, SourceKind, Speed, SrcMeta, SyncMethod};
    use skysync_store::{DriveAccount, InMemoryStore, SyncConfig};

    async fn seeded(cron: Option<&str>) -> (Dispatcher, Arc<InMemoryStore>, Arc<MemDrive>, i64) {
        let drive = Arc::new(MemDrive::new());
        drive.add_share_file("/root/a.txt", 10);
        drive.add_disk_folder("/dst");

        let store = Arc::new(InMemoryStore::new());
        let account_id = store
            .upsert_account(&DriveAccount {
                id: 0,
                kind: DriveType::Quark,
                user_id: "u".into(),
                username: "u".into(),
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
                method: SyncMethod::Incremental,
                speed: Speed::Fast,
                cron: cron.map(str::to_string),
                last_sync: None,
                end_time: None,
                exclude_template_id: None,
                rename_template_id: None,
                remark: String::new(),
            })
            .await
            .unwrap();

        let mut registry = ClientRegistry::new();
        let shared = drive.clone();
        registry.register(DriveType::Quark, move |_| {
            Ok(shared.clone() as Arc<dyn DriveClient>)
        });

        let dispatcher = Dispatcher::new(
            store.clone() as Arc<dyn SyncStore>,
            Arc::new(registry),
            EngineSettings::default(),
            DispatcherSettings::default(),
        );
        (dispatcher, store, drive, config_id)
    }

    #[tokio::test]
    async fn two_ticks_in_one_window_create_exactly_one_task() {
        // an every-minute cron is always inside its execution window
        let (dispatcher, store, _drive, config_id) = seeded(Some("* * * * *")).await;
        let cancel = CancellationToken::new();

        let first = dispatcher.tick(&cancel).await;
        assert_eq!(first.executed, 1);

        let second = dispatcher.tick(&cancel).await;
        assert_eq!(second.executed, 0);
        assert_eq!(second.skipped, 1);

        assert_eq!(store.list_tasks(Some(config_id), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn configs_without_cron_are_skipped() {
        let (dispatcher, store, _drive, config_id) = seeded(None).await;
        let summary = dispatcher.tick(&CancellationToken::new()).await;
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.skipped, 1);
        assert!(store.list_tasks(Some(config_id), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_cron_is_journaled_as_a_failure() {
        let (dispatcher, store, _drive, _config_id) = seeded(Some("every day at nine")).await;
        let summary = dispatcher.tick(&CancellationToken::new()).await;
        assert_eq!(summary.failed, 1);

        let events = store.list_events(10).await.unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, DispatchEvent::ConfigFailed { .. })));
    }

    #[tokio::test]
    async fn expired_configs_are_skipped() {
        let (dispatcher, store, _drive, config_id) = seeded(Some("* * * * *")).await;
        let mut config = store.get_config(config_id).await.unwrap().unwrap();
        config.end_time = Some(Utc::now() - Duration::hours(1));
        store.upsert_config(&config).await.unwrap();

        let summary = dispatcher.tick(&CancellationToken::new()).await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.executed, 0);
    }
}
