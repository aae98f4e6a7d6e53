use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use skysync_domain::{DriveType, FileInfo, ShareInfo, ShareScope, UserInfo};

use crate::client::{
    CancelShareRequest, CreateShareRequest, DriveClient, ListDiskRequest, ListShareRequest,
    MkdirRequest, RemoveRequest, ShareInfoRequest, TransferRequest,
};
use crate::error::ClientError;

#[derive(Debug, Clone)]
struct MemEntry {
    id: String,
    /// Absolute path, no trailing slash; `""` is the tree root.
    path: String,
    is_folder: bool,
    size: u64,
}

#[derive(Debug, Default)]
struct MemState {
    share: Vec<MemEntry>,
    disk: Vec<MemEntry>,
    next_id: u64,
    transfer_calls: Vec<TransferRequest>,
    remove_calls: Vec<RemoveRequest>,
    mkdir_calls: u32,
    transfer_failures: VecDeque<ClientError>,
    remove_failures: VecDeque<ClientError>,
    user_info_failure: Option<ClientError>,
    local_shares: Vec<ShareInfo>,
    cancelled_shares: Vec<String>,
    created_shares: Vec<ShareInfo>,
}

fn norm(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parent_of(path: &str) -> String {
    path.rsplit_once('/').map(|(p, _)| p.to_string()).unwrap_or_default()
}

fn name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// An in-memory drive simulating both a share tree and the user's own disk.
///
/// Transfers copy subtrees share→disk the way providers copy server-side, so
/// the engine can be exercised end to end without a network. The fake also
/// enforces the transfer token contract: every transferred id must arrive with
/// the `share_fid_token` that was handed out for it at listing time.
#[derive(Debug, Default)]
pub struct MemDrive {
    inner: Mutex<MemState>,
}

impl MemDrive {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(state: &mut MemState) -> String {
        state.next_id += 1;
        format!("m{}", state.next_id)
    }

    fn ensure_dirs(tree: &mut Vec<MemEntry>, next_id: &mut u64, dir: &str) {
        let dir = norm(dir);
        if dir.is_empty() {
            return;
        }
        let mut current = String::new();
        for part in dir.trim_start_matches('/').split('/') {
            current = format!("{current}/{part}");
            if !tree.iter().any(|e| e.path == current) {
                *next_id += 1;
                tree.push(MemEntry {
                    id: format!("m{next_id}"),
                    path: current.clone(),
                    is_folder: true,
                    size: 0,
                });
            }
        }
    }

    // ── Seeding ───────────────────────────────────────────────────────────────

    pub fn add_share_file(&self, path: &str, size: u64) {
        let mut state = self.inner.lock().unwrap();
        let path = norm(path);
        let mut next = state.next_id;
        Self::ensure_dirs(&mut state.share, &mut next, &parent_of(&path));
        state.next_id = next;
        let id = Self::alloc_id(&mut state);
        state.share.push(MemEntry { id, path, is_folder: false, size });
    }

    pub fn add_share_folder(&self, path: &str) {
        let mut state = self.inner.lock().unwrap();
        let mut next = state.next_id;
        Self::ensure_dirs(&mut state.share, &mut next, &norm(path));
        state.next_id = next;
    }

    pub fn add_disk_file(&self, path: &str, size: u64) {
        let mut state = self.inner.lock().unwrap();
        let path = norm(path);
        let mut next = state.next_id;
        Self::ensure_dirs(&mut state.disk, &mut next, &parent_of(&path));
        state.next_id = next;
        let id = Self::alloc_id(&mut state);
        state.disk.push(MemEntry { id, path, is_folder: false, size });
    }

    pub fn add_disk_folder(&self, path: &str) {
        let mut state = self.inner.lock().unwrap();
        let mut next = state.next_id;
        Self::ensure_dirs(&mut state.disk, &mut next, &norm(path));
        state.next_id = next;
    }

    pub fn add_local_share(&self, share: ShareInfo) {
        self.inner.lock().unwrap().local_shares.push(share);
    }

    /// Queue an error for the next transfer call(s).
    pub fn fail_next_transfer(&self, err: ClientError) {
        self.inner.lock().unwrap().transfer_failures.push_back(err);
    }

    pub fn fail_next_remove(&self, err: ClientError) {
        self.inner.lock().unwrap().remove_failures.push_back(err);
    }

    pub fn fail_user_info(&self, err: ClientError) {
        self.inner.lock().unwrap().user_info_failure = Some(err);
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    /// `(path, size, is_folder)` of every disk entry, sorted by path.
    pub fn disk_snapshot(&self) -> Vec<(String, u64, bool)> {
        let state = self.inner.lock().unwrap();
        let mut all: Vec<_> = state
            .disk
            .iter()
            .map(|e| (e.path.clone(), e.size, e.is_folder))
            .collect();
        all.sort();
        all
    }

    pub fn transfer_calls(&self) -> Vec<TransferRequest> {
        self.inner.lock().unwrap().transfer_calls.clone()
    }

    pub fn remove_calls(&self) -> Vec<RemoveRequest> {
        self.inner.lock().unwrap().remove_calls.clone()
    }

    pub fn mkdir_calls(&self) -> u32 {
        self.inner.lock().unwrap().mkdir_calls
    }

    pub fn cancelled_shares(&self) -> Vec<String> {
        self.inner.lock().unwrap().cancelled_shares.clone()
    }

    pub fn created_shares(&self) -> Vec<ShareInfo> {
        self.inner.lock().unwrap().created_shares.clone()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn children(tree: &[MemEntry], dir: &str) -> Vec<MemEntry> {
        let dir = norm(dir);
        tree.iter().filter(|e| parent_of(&e.path) == dir).cloned().collect()
    }

    fn dir_id(tree: &[MemEntry], dir: &str) -> String {
        let dir = norm(dir);
        if dir.is_empty() {
            return "0".into();
        }
        tree.iter()
            .find(|e| e.path == dir)
            .map(|e| e.id.clone())
            .unwrap_or_default()
    }

    fn share_token_for(id: &str) -> String {
        format!("tok-{id}")
    }

    /// Copy `entry` (and its subtree, for folders) from share to disk.
    fn copy_subtree(state: &mut MemState, entry: &MemEntry, target_dir: &str) {
        let target_path = format!("{}/{}", norm(target_dir), name_of(&entry.path));
        let mut copies = Vec::new();
        let mut next = state.next_id;
        if entry.is_folder {
            Self::ensure_dirs(&mut state.disk, &mut next, &target_path);
            let prefix = format!("{}/", entry.path);
            for sub in state.share.iter().filter(|e| e.path.starts_with(&prefix)) {
                let rel = &sub.path[entry.path.len()..];
                let dst = format!("{target_path}{rel}");
                if sub.is_folder {
                    Self::ensure_dirs(&mut state.disk, &mut next, &dst);
                } else {
                    next += 1;
                    copies.push(MemEntry {
                        id: format!("m{next}"),
                        path: dst,
                        is_folder: false,
                        size: sub.size,
                    });
                }
            }
        } else {
            // Provider copy overwrites nothing: a same-name file simply lands
            // again; keep one entry per path with the source size.
            state.disk.retain(|e| e.path != target_path);
            next += 1;
            copies.push(MemEntry {
                id: format!("m{next}"),
                path: target_path,
                is_folder: false,
                size: entry.size,
            });
        }
        state.next_id = next;
        state.disk.extend(copies);
    }

    fn to_file_info(entry: &MemEntry, parent_id: &str, ext: Value) -> FileInfo {
        FileInfo {
            file_id: entry.id.clone(),
            file_name: name_of(&entry.path),
            file_path: entry.path.clone(),
            is_folder: entry.is_folder,
            file_size: if entry.is_folder { 0 } else { entry.size },
            parent_id: parent_id.to_string(),
            created_at: String::new(),
            updated_at: String::new(),
            file_ext: ext,
        }
    }
}

#[async_trait]
impl DriveClient for MemDrive {
    fn drive_type(&self) -> DriveType {
        DriveType::Quark
    }

    async fn get_user_info(&self) -> Result<UserInfo, ClientError> {
        let mut state = self.inner.lock().unwrap();
        if let Some(err) = state.user_info_failure.take() {
            return Err(err);
        }
        Ok(UserInfo {
            user_id: "mem-user".into(),
            username: "mem".into(),
            avatar_url: String::new(),
            quota: 1 << 40,
            used: 1 << 20,
            is_vip: true,
            is_supervip: false,
        })
    }

    async fn list_disk(&self, req: &ListDiskRequest) -> Result<Vec<FileInfo>, ClientError> {
        let state = self.inner.lock().unwrap();
        let dir = norm(&req.file_path);
        if !dir.is_empty() && !state.disk.iter().any(|e| e.path == dir && e.is_folder) {
            return Err(ClientError::NotFound(format!("no such directory: {dir}")));
        }
        let parent_id = Self::dir_id(&state.disk, &dir);
        Ok(Self::children(&state.disk, &dir)
            .iter()
            .map(|e| Self::to_file_info(e, &parent_id, Value::Null))
            .collect())
    }

    async fn list_share(&self, req: &ListShareRequest) -> Result<Vec<FileInfo>, ClientError> {
        let state = self.inner.lock().unwrap();
        let dir = norm(&req.file_path);
        if let Some(hit) = state.share.iter().find(|e| e.path == dir) {
            if !hit.is_folder {
                return Err(ClientError::PathInvalid(format!(
                    "'{dir}' is a file, not a directory"
                )));
            }
        } else if !dir.is_empty() {
            return Err(ClientError::NotFound(format!("no such share path: {dir}")));
        }
        let parent_id = Self::dir_id(&state.share, &dir);
        Ok(Self::children(&state.share, &dir)
            .iter()
            .map(|e| {
                let ext = json!({
                    "stoken": "st-mem",
                    "share_fid_token": Self::share_token_for(&e.id),
                    "pdir_fid": parent_id,
                });
                Self::to_file_info(e, &parent_id, ext)
            })
            .collect())
    }

    async fn list_share_info(&self, req: &ShareInfoRequest) -> Result<Vec<ShareInfo>, ClientError> {
        let state = self.inner.lock().unwrap();
        match req.scope {
            ShareScope::Link => Ok(Vec::new()),
            ShareScope::Local => {
                let start = ((req.page.max(1) - 1) * req.size) as usize;
                Ok(state
                    .local_shares
                    .iter()
                    .skip(start)
                    .take(req.size as usize)
                    .cloned()
                    .collect())
            }
        }
    }

    async fn mkdir(&self, req: &MkdirRequest) -> Result<FileInfo, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.mkdir_calls += 1;
        let path = norm(&req.file_path);
        if let Some(existing) = state.disk.iter().find(|e| e.path == path) {
            if !req.return_if_exist {
                return Err(ClientError::Provider {
                    code: -8,
                    message: format!("directory exists: {path}"),
                });
            }
            let parent_id = Self::dir_id(&state.disk, &parent_of(&path));
            return Ok(Self::to_file_info(&existing.clone(), &parent_id, Value::Null));
        }
        let mut next = state.next_id;
        Self::ensure_dirs(&mut state.disk, &mut next, &path);
        state.next_id = next;
        let created = state.disk.iter().find(|e| e.path == path).cloned();
        let parent_id = Self::dir_id(&state.disk, &parent_of(&path));
        created
            .map(|e| Self::to_file_info(&e, &parent_id, Value::Null))
            .ok_or_else(|| ClientError::Provider { code: -1, message: "mkdir failed".into() })
    }

    async fn remove(&self, req: &RemoveRequest) -> Result<bool, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.remove_calls.push(req.clone());
        if let Some(err) = state.remove_failures.pop_front() {
            return Err(err);
        }
        let mut doomed: Vec<String> = Vec::new();
        for path in &req.file_paths {
            doomed.push(norm(path));
        }
        for id in &req.file_ids {
            if let Some(e) = state.disk.iter().find(|e| &e.id == id) {
                doomed.push(e.path.clone());
            }
        }
        state.disk.retain(|e| {
            !doomed
                .iter()
                .any(|d| e.path == *d || e.path.starts_with(&format!("{d}/")))
        });
        Ok(true)
    }

    async fn transfer(&self, req: &TransferRequest) -> Result<bool, ClientError> {
        req.check_correspondence()?;
        let mut state = self.inner.lock().unwrap();
        state.transfer_calls.push(req.clone());
        if let Some(err) = state.transfer_failures.pop_front() {
            return Err(err);
        }
        for ext in &req.files_ext {
            let expected = Self::share_token_for(&ext.file_id);
            let got = ext.file_ext.get("share_fid_token").and_then(Value::as_str);
            if got != Some(expected.as_str()) {
                return Err(ClientError::Provider {
                    code: -1,
                    message: format!(
                        "stale or misplaced share token for {}: {:?}",
                        ext.file_id, got
                    ),
                });
            }
        }
        let sources: Vec<MemEntry> = req
            .file_ids
            .iter()
            .map(|id| {
                state
                    .share
                    .iter()
                    .find(|e| &e.id == id)
                    .cloned()
                    .ok_or_else(|| ClientError::NotFound(format!("share item {id}")))
            })
            .collect::<Result<_, _>>()?;
        for entry in &sources {
            Self::copy_subtree(&mut state, entry, &req.target_path);
        }
        Ok(true)
    }

    async fn create_share(&self, req: &CreateShareRequest) -> Result<ShareInfo, ClientError> {
        let mut state = self.inner.lock().unwrap();
        let n = state.created_shares.len() + 1;
        let share = ShareInfo {
            title: req.file_name.clone(),
            share_id: format!("share-{n}"),
            pwd_id: format!("pwd-{n}"),
            url: format!("https://mem.example/s/pwd-{n}"),
            password: req.password.clone().unwrap_or_default(),
            expired_type: req.expired_type.days(),
            expired_at: Some(Utc::now() + Duration::days(req.expired_type.days().max(1))),
            expired_left: Some(req.expired_type.days()),
            view_count: 0,
            audit_status: 1,
            status: 1,
            file_id: req.file_ids.first().cloned(),
            file_size: None,
            path_info: None,
        };
        state.created_shares.push(share.clone());
        Ok(share)
    }

    async fn cancel_share(&self, req: &CancelShareRequest) -> Result<bool, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.cancelled_shares.extend(req.share_ids.iter().cloned());
        let ids = req.share_ids.clone();
        state.local_shares.retain(|s| !ids.contains(&s.share_id));
        Ok(true)
    }
}
