use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use skysync_client::{
    CancelShareRequest, ClientError, ClientRegistry, CreateShareRequest, ShareInfoRequest,
};
use skysync_domain::{ExpiredType, ShareScope};
use skysync_store::SyncStore;
use tracing::{info, warn};

const SHARE_PAGE_SIZE: u32 = 100;

/// Sleep a uniformly random number of seconds in `[low, high]`; keeps the
/// maintenance workers from hammering one provider endpoint in bursts.
async fn stagger(low: u64, high: u64) {
    let secs = rand::thread_rng().gen_range(low..=high);
    tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
}

// ── refresh_drive_users ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserRefreshSummary {
    pub checked: u32,
    pub refreshed: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Re-fetch profile and quota for every account. An authentication rejection
/// marks the account invalid; other failures leave it untouched for the next
/// round.
pub async fn refresh_drive_users(
    store: Arc<dyn SyncStore>,
    registry: Arc<ClientRegistry>,
) -> UserRefreshSummary {
    let mut summary = UserRefreshSummary::default();
    let accounts = match store.list_accounts(false).await {
        Ok(accounts) => accounts,
        Err(e) => {
            warn!(error = %e, "could not list accounts");
            return summary;
        }
    };
    summary.checked = accounts.len() as u32;

    for account in accounts {
        if !account.is_valid || account.cookies.trim().is_empty() {
            summary.skipped += 1;
            continue;
        }
        let client = match registry.connect(account.kind, &account.cookies) {
            Ok(client) => client,
            Err(e) => {
                warn!(account_id = account.id, error = %e, "client build failed");
                summary.failed += 1;
                continue;
            }
        };
        match client.get_user_info().await {
            Ok(info) => {
                if let Err(e) = store.update_account_profile(account.id, &info).await {
                    warn!(account_id = account.id, error = %e, "profile update failed");
                    summary.failed += 1;
                } else {
                    info!(account_id = account.id, username = %info.username, "account refreshed");
                    summary.refreshed += 1;
                }
            }
            Err(ClientError::Auth(reason)) => {
                warn!(account_id = account.id, %reason, "credentials rejected, marking invalid");
                if let Err(e) = store.set_account_validity(account.id, false).await {
                    warn!(account_id = account.id, error = %e, "could not mark account invalid");
                }
                summary.failed += 1;
            }
            Err(e) => {
                warn!(account_id = account.id, error = %e, "user info fetch failed");
                summary.failed += 1;
            }
        }
    }
    summary
}

// ── refresh_expiring_resources ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceRefreshSummary {
    pub checked: u32,
    pub refreshed: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Re-share catalogued resources whose link runs out within `window`.
/// Refreshed shares get the 7-day default lifetime; permanent shares are
/// never touched.
pub async fn refresh_expiring_resources(
    store: Arc<dyn SyncStore>,
    registry: Arc<ClientRegistry>,
    window: Duration,
) -> ResourceRefreshSummary {
    let mut summary = ResourceRefreshSummary::default();
    let threshold = Utc::now() + window;
    let resources = match store.list_expiring_resources(threshold).await {
        Ok(resources) => resources,
        Err(e) => {
            warn!(error = %e, "could not list expiring resources");
            return summary;
        }
    };
    summary.checked = resources.len() as u32;

    for resource in resources {
        if resource.expired_type == 0 {
            summary.skipped += 1;
            continue;
        }
        if resource.file_id.is_empty() {
            warn!(resource_id = resource.id, "no file id, cannot re-share");
            summary.failed += 1;
            continue;
        }
        let account = match store.get_account(resource.account_id).await {
            Ok(Some(account)) if account.is_valid && !account.cookies.trim().is_empty() => account,
            Ok(_) => {
                warn!(resource_id = resource.id, "owning account missing or invalid");
                summary.failed += 1;
                continue;
            }
            Err(e) => {
                warn!(resource_id = resource.id, error = %e, "account load failed");
                summary.failed += 1;
                continue;
            }
        };
        let client = match registry.connect(account.kind, &account.cookies) {
            Ok(client) => client,
            Err(e) => {
                warn!(resource_id = resource.id, error = %e, "client build failed");
                summary.failed += 1;
                continue;
            }
        };

        let request = CreateShareRequest {
            file_name: resource.title.clone(),
            file_ids: vec![resource.file_id.clone()],
            expired_type: ExpiredType::SevenDays,
            password: (!resource.password.is_empty()).then(|| resource.password.clone()),
        };
        match client.create_share(&request).await {
            Ok(share) => {
                if let Err(e) = store.update_resource_share(resource.id, &share).await {
                    warn!(resource_id = resource.id, error = %e, "share rewrite failed");
                    summary.failed += 1;
                } else {
                    info!(resource_id = resource.id, url = %share.url, "share refreshed");
                    summary.refreshed += 1;
                }
            }
            Err(e) => {
                warn!(resource_id = resource.id, error = %e, "share create failed");
                summary.failed += 1;
            }
        }
        stagger(5, 10).await;
    }
    summary
}

// ── cleanup_expired_local_shares ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShareCleanupSummary {
    pub checked_accounts: u32,
    pub cleaned_shares: u32,
    pub failed_accounts: u32,
}

/// Page each valid account's own shares, collect the dead ones, and cancel
/// them in one batch per account.
pub async fn cleanup_expired_local_shares(
    store: Arc<dyn SyncStore>,
    registry: Arc<ClientRegistry>,
) -> ShareCleanupSummary {
    let mut summary = ShareCleanupSummary::default();
    let accounts = match store.list_accounts(true).await {
        Ok(accounts) => accounts,
        Err(e) => {
            warn!(error = %e, "could not list accounts");
            return summary;
        }
    };
    summary.checked_accounts = accounts.len() as u32;

    for (i, account) in accounts.iter().enumerate() {
        if account.cookies.trim().is_empty() {
            continue;
        }
        let client = match registry.connect(account.kind, &account.cookies) {
            Ok(client) => client,
            Err(e) => {
                warn!(account_id = account.id, error = %e, "client build failed");
                summary.failed_accounts += 1;
                continue;
            }
        };

        let mut expired: Vec<String> = Vec::new();
        let mut page = 1u32;
        loop {
            let shares = match client
                .list_share_info(&ShareInfoRequest {
                    scope: ShareScope::Local,
                    source_id: String::new(),
                    page,
                    size: SHARE_PAGE_SIZE,
                    desc: true,
                })
                .await
            {
                Ok(shares) => shares,
                Err(e) => {
                    warn!(account_id = account.id, page, error = %e, "share page fetch failed");
                    break;
                }
            };
            if shares.is_empty() {
                break;
            }
            let page_len = shares.len();
            expired.extend(
                shares
                    .iter()
                    .filter(|s| s.is_expired())
                    .map(|s| s.share_id.clone()),
            );
            if page_len < SHARE_PAGE_SIZE as usize {
                break;
            }
            page += 1;
            stagger(5, 8).await;
        }

        if !expired.is_empty() {
            let count = expired.len() as u32;
            match client.cancel_share(&CancelShareRequest { share_ids: expired }).await {
                Ok(true) => {
                    info!(account_id = account.id, count, "expired shares cancelled");
                    summary.cleaned_shares += count;
                }
                Ok(false) | Err(_) => {
                    warn!(account_id = account.id, "share cancellation failed");
                    summary.failed_accounts += 1;
                }
            }
        }

        if i + 1 < accounts.len() {
            stagger(30, 40).await;
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use skysync_client::{DriveClient, MemDrive};
    use skysync_domain::{DriveType, ShareInfo};
    use skysync_store::{DriveAccount, InMemoryStore, Resource};

    fn account(valid: bool) -> DriveAccount {
        DriveAccount {
            id: 0,
            kind: DriveType::Quark,
            user_id: "u".into(),
            username: "old-name".into(),
            cookies: "__pus=x".into(),
            avatar_url: String::new(),
            quota: 0,
            used: 0,
            is_vip: false,
            is_supervip: false,
            is_valid: valid,
        }
    }

    fn wiring(drive: Arc<MemDrive>) -> Arc<ClientRegistry> {
        let mut registry = ClientRegistry::new();
        registry.register(DriveType::Quark, move |_| {
            Ok(drive.clone() as Arc<dyn DriveClient>)
        });
        Arc::new(registry)
    }

    fn local_share(id: &str, expired_left: i64) -> ShareInfo {
        ShareInfo {
            title: id.into(),
            share_id: id.into(),
            pwd_id: format!("p-{id}"),
            url: format!("https://mem.example/s/{id}"),
            password: String::new(),
            expired_type: 7,
            expired_at: None,
            expired_left: Some(expired_left),
            view_count: 0,
            audit_status: 1,
            status: 1,
            file_id: None,
            file_size: None,
            path_info: None,
        }
    }

    #[tokio::test]
    async fn refresh_updates_profile_fields() {
        let store = Arc::new(InMemoryStore::new());
        let id = store.upsert_account(&account(true)).await.unwrap();
        let drive = Arc::new(MemDrive::new());

        let summary =
            refresh_drive_users(store.clone() as Arc<dyn SyncStore>, wiring(drive)).await;
        assert_eq!(summary.refreshed, 1);
        let refreshed = store.get_account(id).await.unwrap().unwrap();
        assert_eq!(refreshed.username, "mem");
        assert!(refreshed.quota > 0);
    }

    #[tokio::test]
    async fn auth_failure_invalidates_the_account() {
        let store = Arc::new(InMemoryStore::new());
        let id = store.upsert_account(&account(true)).await.unwrap();
        let drive = Arc::new(MemDrive::new());
        drive.fail_user_info(ClientError::Auth("cookie expired".into()));

        let summary =
            refresh_drive_users(store.clone() as Arc<dyn SyncStore>, wiring(drive)).await;
        assert_eq!(summary.failed, 1);
        assert!(!store.get_account(id).await.unwrap().unwrap().is_valid);
    }

    #[tokio::test(start_paused = true)]
    async fn expiring_resources_get_a_fresh_seven_day_share() {
        let store = Arc::new(InMemoryStore::new());
        let account_id = store.upsert_account(&account(true)).await.unwrap();
        let resource_id = store
            .upsert_resource(&Resource {
                id: 0,
                account_id,
                title: "course".into(),
                file_id: "f1".into(),
                url: "https://old.example/s/x".into(),
                share_id: "old-share".into(),
                pwd_id: "old-pwd".into(),
                password: String::new(),
                expired_type: 7,
                expired_at: Some(Utc::now() + Duration::hours(2)),
                status: 1,
            })
            .await
            .unwrap();
        let drive = Arc::new(MemDrive::new());

        let summary = refresh_expiring_resources(
            store.clone() as Arc<dyn SyncStore>,
            wiring(drive.clone()),
            Duration::hours(24),
        )
        .await;
        assert_eq!(summary.refreshed, 1);

        let shares = drive.created_shares();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].expired_type, 7);

        // the catalog row now points at the fresh share
        let updated = store
            .list_expiring_resources(Utc::now() + Duration::days(30))
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.id == resource_id)
            .unwrap();
        assert_eq!(updated.share_id, "share-1");
        assert_ne!(updated.url, "https://old.example/s/x");
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_resources_are_left_alone() {
        let store = Arc::new(InMemoryStore::new());
        let account_id = store.upsert_account(&account(true)).await.unwrap();
        store
            .upsert_resource(&Resource {
                id: 0,
                account_id,
                title: "forever".into(),
                file_id: "f1".into(),
                url: String::new(),
                share_id: String::new(),
                pwd_id: String::new(),
                password: String::new(),
                expired_type: 0,
                expired_at: Some(Utc::now()),
                status: 1,
            })
            .await
            .unwrap();
        let drive = Arc::new(MemDrive::new());

        let summary = refresh_expiring_resources(
            store.clone() as Arc<dyn SyncStore>,
            wiring(drive.clone()),
            Duration::hours(24),
        )
        .await;
        assert_eq!(summary.skipped, 1);
        assert!(drive.created_shares().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dead_local_shares_are_batch_cancelled() {
        let store = Arc::new(InMemoryStore::new());
        store.upsert_account(&account(true)).await.unwrap();
        let drive = Arc::new(MemDrive::new());
        drive.add_local_share(local_share("alive", 3));
        drive.add_local_share(local_share("dead-1", -1));
        drive.add_local_share({
            let mut share = local_share("dead-2", 5);
            share.expired_type = -1;
            share
        });

        let summary =
            cleanup_expired_local_shares(store.clone() as Arc<dyn SyncStore>, wiring(drive.clone()))
                .await;
        assert_eq!(summary.cleaned_shares, 2);
        let mut cancelled = drive.cancelled_shares();
        cancelled.sort();
        assert_eq!(cancelled, vec!["dead-1", "dead-2"]);
    }
}
