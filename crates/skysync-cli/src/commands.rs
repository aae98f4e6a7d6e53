use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use skysync_client::ClientRegistry;
use skysync_config::AppSettings;
use skysync_dispatch::{
    cleanup_expired_local_shares, refresh_drive_users, refresh_expiring_resources, Dispatcher,
    DispatcherSettings,
};
use skysync_engine::{execute_sync, EngineSettings};
use skysync_store::{InMemoryStore, PostgresStore, SyncStore};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::MaintenanceWorker;
use crate::output;

// Maintenance cadences while serving. Resource refresh runs well inside the
// expiry window it scans; the others are cheap enough to run on long periods.
const RESOURCE_REFRESH_PERIOD: std::time::Duration = std::time::Duration::from_secs(60 * 60);
const USER_REFRESH_PERIOD: std::time::Duration = std::time::Duration::from_secs(6 * 60 * 60);
const SHARE_CLEANUP_PERIOD: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

pub fn load_settings(path: Option<&Path>, database_url: Option<String>) -> Result<AppSettings> {
    let mut settings = skysync_config::load_settings(path).context("loading settings")?;
    if database_url.is_some() {
        settings.database.url = database_url;
    }
    Ok(settings)
}

async fn build_store(settings: &AppSettings) -> Result<Arc<dyn SyncStore>> {
    match &settings.database.url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .context("connecting to Postgres")?;
            Ok(Arc::new(store))
        }
        None => {
            println!("No database configured; using the in-memory store (state dies with the process)");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

fn engine_settings(settings: &AppSettings) -> EngineSettings {
    EngineSettings { max_depth: settings.sync.max_depth }
}

fn dispatcher_settings(settings: &AppSettings) -> DispatcherSettings {
    DispatcherSettings {
        tick_interval: std::time::Duration::from_secs(settings.dispatcher.tick_secs),
        execution_window: chrono::Duration::minutes(settings.dispatcher.execution_window_mins),
        worker_cap: settings.dispatcher.worker_cap,
    }
}

// ── serve ─────────────────────────────────────────────────────────────────────

pub async fn serve(settings: AppSettings) -> Result<()> {
    let store = build_store(&settings).await?;
    let registry = Arc::new(ClientRegistry::standard());
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        registry.clone(),
        engine_settings(&settings),
        dispatcher_settings(&settings),
    ));
    let refresh_window = chrono::Duration::hours(settings.sync.resource_refresh_window_hours);
    let cancel = CancellationToken::new();

    let dispatcher_loop = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        async move { dispatcher.run(cancel).await }
    });

    let resource_loop = tokio::spawn(maintenance_loop(
        RESOURCE_REFRESH_PERIOD,
        cancel.clone(),
        {
            let store = store.clone();
            let registry = registry.clone();
            move || {
                let store = store.clone();
                let registry = registry.clone();
                async move {
                    let summary =
                        refresh_expiring_resources(store, registry, refresh_window).await;
                    info!(refreshed = summary.refreshed, failed = summary.failed, "resource refresh pass");
                }
            }
        },
    ));
    let user_loop = tokio::spawn(maintenance_loop(USER_REFRESH_PERIOD, cancel.clone(), {
        let store = store.clone();
        let registry = registry.clone();
        move || {
            let store = store.clone();
            let registry = registry.clone();
            async move {
                let summary = refresh_drive_users(store, registry).await;
                info!(refreshed = summary.refreshed, failed = summary.failed, "user refresh pass");
            }
        }
    }));
    let cleanup_loop = tokio::spawn(maintenance_loop(SHARE_CLEANUP_PERIOD, cancel.clone(), {
        let store = store.clone();
        let registry = registry.clone();
        move || {
            let store = store.clone();
            let registry = registry.clone();
            async move {
                let summary = cleanup_expired_local_shares(store, registry).await;
                info!(cleaned = summary.cleaned_shares, "share cleanup pass");
            }
        }
    }));

    println!("skysync serving; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    println!("Shutting down…");
    cancel.cancel();
    let _ = tokio::join!(dispatcher_loop, resource_loop, user_loop, cleanup_loop);
    Ok(())
}

/// Run `pass` every `period` until cancelled. The first pass waits one full
/// period so a restart loop cannot hammer the providers.
async fn maintenance_loop<F, Fut>(
    period: std::time::Duration,
    cancel: CancellationToken,
    pass: F,
) where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // consume the immediate first tick
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => pass().await,
        }
    }
}

// ── one-shot commands ─────────────────────────────────────────────────────────

pub async fn tick(settings: AppSettings) -> Result<()> {
    let store = build_store(&settings).await?;
    let registry = Arc::new(ClientRegistry::standard());
    let dispatcher = Dispatcher::new(
        store,
        registry,
        engine_settings(&settings),
        dispatcher_settings(&settings),
    );
    let summary = dispatcher.tick(&CancellationToken::new()).await;
    println!(
        "checked {} config(s): {} executed, {} failed, {} skipped",
        summary.checked, summary.executed, summary.failed, summary.skipped
    );
    Ok(())
}

pub async fn sync_once(settings: AppSettings, config_id: i64) -> Result<()> {
    let store = build_store(&settings).await?;
    let registry = ClientRegistry::standard();
    let outcome = execute_sync(
        config_id,
        store,
        &registry,
        &engine_settings(&settings),
        CancellationToken::new(),
    )
    .await;
    print!("{}", output::render_outcome(&outcome));
    if !outcome.success {
        bail!(
            "sync failed: {}",
            outcome.error.unwrap_or_else(|| "unknown error".into())
        );
    }
    Ok(())
}

pub async fn apply(settings: AppSettings, seed_path: &Path) -> Result<()> {
    let store = build_store(&settings).await?;
    let seed = skysync_config::load_seed(seed_path)?;
    let label = seed_path.display().to_string();
    let summary =
        skysync_config::apply_seed(&store, &seed, &label, settings.sync.default_speed).await?;
    println!(
        "applied {}: {} account(s), {} template(s), {} config(s), {} resource(s)",
        label, summary.accounts, summary.templates, summary.configs, summary.resources
    );
    Ok(())
}

pub async fn tasks(settings: AppSettings, config_id: Option<i64>, limit: u32) -> Result<()> {
    let store = build_store(&settings).await?;
    let tasks = store.list_tasks(config_id, limit).await?;
    print!("{}", output::render_tasks(&tasks));
    Ok(())
}

pub async fn items(settings: AppSettings, task_id: i64) -> Result<()> {
    let store = build_store(&settings).await?;
    let items = store.list_task_items(task_id).await?;
    print!("{}", output::render_items(&items));
    Ok(())
}

pub async fn events(settings: AppSettings, limit: u32) -> Result<()> {
    let store = build_store(&settings).await?;
    let events = store.list_events(limit).await?;
    print!("{}", output::render_events(&events));
    Ok(())
}

pub async fn maintain(settings: AppSettings, worker: MaintenanceWorker) -> Result<()> {
    let store = build_store(&settings).await?;
    let registry = Arc::new(ClientRegistry::standard());
    match worker {
        MaintenanceWorker::RefreshUsers => {
            let summary = refresh_drive_users(store, registry).await;
            println!(
                "checked {}: {} refreshed, {} failed, {} skipped",
                summary.checked, summary.refreshed, summary.failed, summary.skipped
            );
        }
        MaintenanceWorker::RefreshResources => {
            let window = chrono::Duration::hours(settings.sync.resource_refresh_window_hours);
            let summary = refresh_expiring_resources(store, registry, window).await;
            println!(
                "checked {}: {} refreshed, {} failed, {} skipped",
                summary.checked, summary.refreshed, summary.failed, summary.skipped
            );
        }
        MaintenanceWorker::CleanupShares => {
            let summary = cleanup_expired_local_shares(store, registry).await;
            println!(
                "checked {} account(s): {} share(s) cancelled, {} account(s) failed",
                summary.checked_accounts, summary.cleaned_shares, summary.failed_accounts
            );
        }
    }
    Ok(())
}
