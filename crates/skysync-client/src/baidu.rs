use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use skysync_domain::{DriveType, FileInfo, ShareInfo, ShareScope, SourceKind, UserInfo};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::client::{
    CancelShareRequest, CreateShareRequest, DriveClient, ListDiskRequest, ListShareRequest,
    MkdirRequest, RemoveRequest, ShareInfoRequest, TransferRequest,
};
use crate::error::ClientError;

const DISK_PAGE_SIZE: u32 = 100;
const SHARE_PAGE_SIZE: u32 = 50;
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ── Base URLs (overridden in tests to point at a mock server) ─────────────────

#[derive(Clone, Debug)]
struct BaseUrls {
    pan: String,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self { pan: "https://pan.baidu.com".into() }
    }
}

// ── Cookie helpers ────────────────────────────────────────────────────────────

fn cookie_value(cookies: &str, key: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k.trim() == key).then(|| v.trim().to_string())
    })
}

/// Extract the short id from a share URL such as
/// `https://pan.baidu.com/s/1AbCdEf` → `AbCdEf` (the leading `1` is the URL
/// format marker, not part of the id).
fn shorturl_of(url: &str) -> String {
    let tail = url
        .split_once("/s/")
        .map(|(_, t)| t)
        .unwrap_or(url)
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    tail.strip_prefix('1').unwrap_or(tail).to_string()
}

// ── Share events ──────────────────────────────────────────────────────────────

/// One friend/group share message: the unit friend and group shares are
/// addressed by. `roots` holds the top-level items of the share.
struct ShareEvent {
    msg_id: String,
    sharer_uk: String,
    roots: Vec<Value>,
}

// ── BaiduClient ───────────────────────────────────────────────────────────────

/// Adapter for the Baidu pan web API.
///
/// Authentication is a raw cookie string (must carry `BDUSS`). Listing is
/// path-addressed; friend/group shares resolve through share-event records
/// and per-item `{msg_id, from_uk}` tokens. The provider cannot transfer out
/// of public share links through this surface.
#[derive(Debug)]
pub struct BaiduClient {
    http: reqwest::Client,
    cookies: String,
    base: BaseUrls,
    /// The logged-in user's uk, fetched lazily for transfer calls.
    uk: OnceCell<String>,
}

impl BaiduClient {
    pub fn new(cookies: &str) -> Result<Self, ClientError> {
        Self::with_base(cookies, BaseUrls::default())
    }

    fn with_base(cookies: &str, base: BaseUrls) -> Result<Self, ClientError> {
        if cookie_value(cookies, "BDUSS").is_none() {
            return Err(ClientError::Auth("cookie string is missing BDUSS".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Network(format!("http client init: {e}")))?;
        Ok(Self {
            http,
            cookies: cookies.to_string(),
            base,
            uk: OnceCell::new(),
        })
    }

    /// Test constructor pointing at a mock server.
    #[cfg(test)]
    fn for_tests(cookies: &str, server_uri: &str) -> Self {
        Self::with_base(cookies, BaseUrls { pan: server_uri.to_string() }).unwrap()
    }

    // ── Error dictionary ──────────────────────────────────────────────────────

    /// Map a pan.baidu.com `errno` to the typed taxonomy.
    fn map_errno(code: i64, context: &str) -> ClientError {
        match code {
            -6 | -21 => ClientError::Auth(format!("{context}: errno {code}")),
            111 => ClientError::Conflict(format!("{context}: errno 111")),
            -62 | -9 if context.contains("share") => {
                ClientError::PermissionDenied(format!("{context}: captcha or password required"))
            }
            -9 | 2 | 31066 => ClientError::NotFound(format!("{context}: errno {code}")),
            -32 => ClientError::Quota(format!("{context}: errno -32")),
            -33 => ClientError::BatchLimit(format!("{context}: errno -33")),
            -65 | 31034 => ClientError::RateLimit(format!("{context}: errno {code}")),
            _ => ClientError::Provider { code, message: context.to_string() },
        }
    }

    fn check_errno(body: &Value, context: &str) -> Result<(), ClientError> {
        let errno = body["errno"].as_i64().unwrap_or(0);
        if errno == 0 {
            return Ok(());
        }
        Err(Self::map_errno(errno, context))
    }

    // ── HTTP helpers ──────────────────────────────────────────────────────────

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base.pan, path);
        debug!(%url, "baidu GET");
        self.http
            .get(&url)
            .header(reqwest::header::COOKIE, &self.cookies)
            .query(query)
            .send()
            .await
            .map_err(|e| ClientError::network(path, e))?
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("{path} decode: {e}")))
    }

    async fn post_form(
        &self,
        path: &str,
        query: &[(&str, String)],
        form: &[(&str, String)],
    ) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base.pan, path);
        debug!(%url, "baidu POST");
        self.http
            .post(&url)
            .header(reqwest::header::COOKIE, &self.cookies)
            .query(query)
            .form(form)
            .send()
            .await
            .map_err(|e| ClientError::network(path, e))?
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("{path} decode: {e}")))
    }

    async fn current_uk(&self) -> Result<String, ClientError> {
        self.uk
            .get_or_try_init(|| async {
                let info = self.fetch_uinfo().await?;
                Ok::<_, ClientError>(info.user_id)
            })
            .await
            .map(|uk| uk.clone())
    }

    async fn fetch_uinfo(&self) -> Result<UserInfo, ClientError> {
        let body = self
            .get_json("/rest/2.0/xpan/nas", &[("method", "uinfo".into())])
            .await?;
        Self::check_errno(&body, "uinfo")?;
        let vip_type = body["vip_type"].as_i64().unwrap_or(0);
        Ok(UserInfo {
            user_id: body["uk"].as_i64().map(|v| v.to_string()).unwrap_or_default(),
            username: body["baidu_name"].as_str().unwrap_or_default().to_string(),
            avatar_url: body["avatar_url"].as_str().unwrap_or_default().to_string(),
            quota: 0,
            used: 0,
            is_vip: vip_type >= 1,
            is_supervip: vip_type == 2,
        })
    }

    // ── Listing conversion ────────────────────────────────────────────────────

    fn disk_item(item: &Value, parent_id: &str) -> FileInfo {
        FileInfo {
            file_id: item["fs_id"].as_i64().map(|v| v.to_string()).unwrap_or_default(),
            file_name: item["server_filename"].as_str().unwrap_or_default().to_string(),
            file_path: item["path"].as_str().unwrap_or_default().to_string(),
            is_folder: item["isdir"].as_i64().unwrap_or(0) == 1,
            file_size: item["size"].as_u64().unwrap_or(0),
            parent_id: parent_id.to_string(),
            created_at: item["server_ctime"].as_i64().unwrap_or_default().to_string(),
            updated_at: item["server_mtime"].as_i64().unwrap_or_default().to_string(),
            file_ext: Value::Null,
        }
    }

    // ── Share-event plumbing ──────────────────────────────────────────────────

    async fn fetch_share_events(
        &self,
        source: SourceKind,
        source_id: &str,
    ) -> Result<Vec<ShareEvent>, ClientError> {
        let (body, list_path): (Value, &[&str]) = match source {
            SourceKind::Friend => (
                self.get_json(
                    "/mbox/msg/sessionmsg",
                    &[
                        ("opponent_uk", source_id.to_string()),
                        ("type", "1".into()),
                        ("page", "1".into()),
                        ("num", "100".into()),
                    ],
                )
                .await?,
                &["records", "list"],
            ),
            SourceKind::Group => (
                self.get_json(
                    "/mbox/group/listshare",
                    &[("gid", source_id.to_string()), ("limit", "100".into())],
                )
                .await?,
                &["records", "msg_list"],
            ),
            SourceKind::Link => {
                return Err(ClientError::Unsupported(
                    "baidu adapter cannot enumerate link shares".into(),
                ))
            }
        };
        Self::check_errno(&body, "share events")?;

        let mut messages = &body;
        for key in list_path {
            messages = &messages[*key];
        }
        let mut events = Vec::new();
        for msg in messages.as_array().into_iter().flatten() {
            let msg_id = msg["msg_id"].as_i64().map(|v| v.to_string())
                .or_else(|| msg["msg_id"].as_str().map(str::to_string));
            let (sharer_uk, roots) = match source {
                SourceKind::Friend => (
                    msg["from_uk"].as_i64().map(|v| v.to_string()),
                    msg["filelist"]["list"].as_array().cloned().unwrap_or_default(),
                ),
                _ => (
                    msg["uk"].as_i64().map(|v| v.to_string()),
                    msg["file_list"].as_array().cloned().unwrap_or_default(),
                ),
            };
            match (msg_id, sharer_uk) {
                (Some(msg_id), Some(sharer_uk)) if !roots.is_empty() => {
                    events.push(ShareEvent { msg_id, sharer_uk, roots });
                }
                _ => debug!("skipping share event without msg_id/uk/roots"),
            }
        }
        Ok(events)
    }

    /// One level of a friend/group share, paginated until `has_more` drops.
    async fn fetch_share_level(
        &self,
        source: SourceKind,
        source_id: &str,
        event: &ShareEvent,
        fs_id: &str,
    ) -> Result<Vec<Value>, ClientError> {
        let kind = if source == SourceKind::Friend { "1" } else { "2" };
        let mut page = 1u32;
        let mut items = Vec::new();
        loop {
            let body = self
                .get_json(
                    "/mbox/msg/shareinfo",
                    &[
                        ("from_uk", event.sharer_uk.clone()),
                        ("msg_id", event.msg_id.clone()),
                        ("fs_id", fs_id.to_string()),
                        ("type", kind.into()),
                        ("gid", source_id.to_string()),
                        ("page", page.to_string()),
                        ("num", SHARE_PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            Self::check_errno(&body, "share level")?;
            items.extend(body["records"].as_array().cloned().unwrap_or_default());
            if body["has_more"].as_i64().unwrap_or(0) == 0 {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    fn share_item(item: &Value, parent_path: &str, parent_id: &str, event: &ShareEvent) -> FileInfo {
        let name = item["server_filename"].as_str().unwrap_or_default();
        FileInfo {
            file_id: item["fs_id"].as_i64().map(|v| v.to_string()).unwrap_or_default(),
            file_name: name.to_string(),
            file_path: format!("{}/{}", parent_path.trim_end_matches('/'), name),
            is_folder: item["isdir"].as_i64().unwrap_or(0) == 1,
            file_size: item["size"].as_u64().unwrap_or(0),
            parent_id: parent_id.to_string(),
            created_at: item["server_ctime"].as_i64().unwrap_or_default().to_string(),
            updated_at: item["server_mtime"].as_i64().unwrap_or_default().to_string(),
            file_ext: json!({
                "from_uk": event.sharer_uk,
                "msg_id": event.msg_id,
            }),
        }
    }

    fn epoch_plus_days(server_time: Option<i64>, days: i64) -> Option<DateTime<Utc>> {
        let base = server_time?;
        DateTime::<Utc>::from_timestamp(base + days * 86_400, 0)
    }
}

#[async_trait]
impl DriveClient for BaiduClient {
    fn drive_type(&self) -> DriveType {
        DriveType::Baidu
    }

    async fn get_user_info(&self) -> Result<UserInfo, ClientError> {
        let mut info = self.fetch_uinfo().await?;
        let quota = self
            .get_json(
                "/api/quota",
                &[("checkfree", "1".into()), ("checkexpire", "1".into())],
            )
            .await?;
        Self::check_errno(&quota, "quota")?;
        info.quota = quota["total"].as_u64().unwrap_or(0);
        info.used = quota["used"].as_u64().unwrap_or(0);
        Ok(info)
    }

    async fn list_disk(&self, req: &ListDiskRequest) -> Result<Vec<FileInfo>, ClientError> {
        let dir = if req.file_path.starts_with('/') {
            req.file_path.clone()
        } else {
            format!("/{}", req.file_path)
        };
        let parent_id = req.file_id.clone().unwrap_or_default();
        let mut page = 1u32;
        let mut files = Vec::new();
        loop {
            let body = self
                .get_json(
                    "/api/list",
                    &[
                        ("dir", dir.clone()),
                        ("page", page.to_string()),
                        ("num", DISK_PAGE_SIZE.to_string()),
                        ("order", "name".into()),
                        ("desc", if req.desc { "1" } else { "0" }.into()),
                        ("web", "1".into()),
                    ],
                )
                .await?;
            Self::check_errno(&body, &format!("list {dir}"))?;
            let items = body["list"].as_array().cloned().unwrap_or_default();
            let page_len = items.len();
            files.extend(items.iter().map(|i| Self::disk_item(i, &parent_id)));
            if page_len < DISK_PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }
        Ok(files)
    }

    async fn list_share(&self, req: &ListShareRequest) -> Result<Vec<FileInfo>, ClientError> {
        let events = self.fetch_share_events(req.source, &req.source_id).await?;
        let components: Vec<&str> = req
            .file_path
            .trim_matches('/')
            .split('/')
            .filter(|c| !c.is_empty())
            .collect();

        // Share root: one entry per share event's top-level item.
        if components.is_empty() {
            let mut files = Vec::new();
            for event in &events {
                let root = &event.roots[0];
                files.push(Self::share_item(root, "/", "", event));
            }
            return Ok(files);
        }

        // Resolve the event whose top-level item carries the first component.
        let event = events
            .iter()
            .find(|e| e.roots[0]["server_filename"].as_str() == Some(components[0]))
            .ok_or_else(|| {
                ClientError::NotFound(format!(
                    "no share event with root item '{}'",
                    components[0]
                ))
            })?;

        let mut fs_id = event.roots[0]["fs_id"]
            .as_i64()
            .map(|v| v.to_string())
            .unwrap_or_default();
        let mut path = format!("/{}", components[0]);

        // Descend by matching names at each remaining component.
        for (idx, component) in components.iter().enumerate().skip(1) {
            let level = self
                .fetch_share_level(req.source, &req.source_id, event, &fs_id)
                .await?;
            let hit = level
                .iter()
                .find(|item| item["server_filename"].as_str() == Some(*component))
                .ok_or_else(|| {
                    ClientError::NotFound(format!("path component '{component}' not in share"))
                })?;
            let is_last = idx == components.len() - 1;
            if hit["isdir"].as_i64().unwrap_or(0) == 0 && !is_last {
                return Err(ClientError::PathInvalid(format!(
                    "'{component}' is a file but the path continues"
                )));
            }
            fs_id = hit["fs_id"].as_i64().map(|v| v.to_string()).unwrap_or_default();
            path = format!("{path}/{component}");
        }

        let level = self
            .fetch_share_level(req.source, &req.source_id, event, &fs_id)
            .await?;

        // A single-file target lists as itself, keeping its own path.
        let single_file = level.len() == 1
            && level[0]["fs_id"].as_i64().map(|v| v.to_string()) == Some(fs_id.clone())
            && level[0]["isdir"].as_i64().unwrap_or(0) == 0;

        let parent = if single_file {
            path.rsplit_once('/').map(|(p, _)| p.to_string()).unwrap_or_default()
        } else {
            path.clone()
        };
        Ok(level
            .iter()
            .map(|item| Self::share_item(item, &parent, &fs_id, event))
            .collect())
    }

    async fn list_share_info(&self, req: &ShareInfoRequest) -> Result<Vec<ShareInfo>, ClientError> {
        match req.scope {
            ShareScope::Link => {
                let shorturl = shorturl_of(&req.source_id);
                let body = self
                    .get_json(
                        "/api/shorturlinfo",
                        &[
                            ("shorturl", format!("1{shorturl}")),
                            ("page", req.page.to_string()),
                            ("num", req.size.to_string()),
                            ("root", "1".into()),
                        ],
                    )
                    .await?;
                Self::check_errno(&body, "shorturlinfo")?;
                let share_id = body["share_id"].as_i64().map(|v| v.to_string()).unwrap_or_default();
                let title = body["title"].as_str().unwrap_or_default();
                let expired_type = body["expired_type"].as_i64().unwrap_or(0);
                let server_time = body["server_time"].as_i64();
                let expired_at = (expired_type > 0)
                    .then(|| Self::epoch_plus_days(server_time, expired_type))
                    .flatten();
                Ok(body["list"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|item| ShareInfo {
                        title: if title.is_empty() {
                            item["server_filename"].as_str().unwrap_or_default().to_string()
                        } else {
                            title.to_string()
                        },
                        share_id: share_id.clone(),
                        pwd_id: String::new(),
                        url: req.source_id.clone(),
                        password: item["passwd"].as_str().unwrap_or_default().to_string(),
                        expired_type,
                        expired_at,
                        expired_left: None,
                        view_count: 0,
                        audit_status: 1,
                        status: 1,
                        file_id: item["fs_id"].as_i64().map(|v| v.to_string()),
                        file_size: item["size"].as_u64(),
                        path_info: item["path"].as_str().map(str::to_string),
                    })
                    .collect())
            }
            ShareScope::Local => {
                let body = self
                    .get_json(
                        "/share/record",
                        &[
                            ("page", req.page.to_string()),
                            ("num", req.size.to_string()),
                            ("order", "ctime".into()),
                            ("desc", if req.desc { "1" } else { "0" }.into()),
                        ],
                    )
                    .await?;
                Self::check_errno(&body, "share record")?;
                Ok(body["list"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|item| {
                        let expired_type = item["expiredType"].as_i64().unwrap_or(0);
                        ShareInfo {
                            title: item["typicalPath"].as_str().unwrap_or_default().to_string(),
                            share_id: item["shareId"].as_i64().map(|v| v.to_string()).unwrap_or_default(),
                            pwd_id: item["shareId"].as_i64().map(|v| v.to_string()).unwrap_or_default(),
                            url: item["shorturl"].as_str().unwrap_or_default().to_string(),
                            password: item["passwd"].as_str().unwrap_or_default().to_string(),
                            expired_type,
                            expired_at: (expired_type > 0)
                                .then(|| Self::epoch_plus_days(item["ctime"].as_i64(), expired_type))
                                .flatten(),
                            expired_left: None,
                            view_count: item["viewCount"].as_i64().unwrap_or(0),
                            audit_status: 1,
                            status: if expired_type == -1 { 0 } else { 1 },
                            file_id: item["fileId"].as_i64().map(|v| v.to_string()),
                            file_size: item["fileSize"].as_u64(),
                            path_info: item["typicalPath"].as_str().map(str::to_string),
                        }
                    })
                    .collect())
            }
        }
    }

    async fn mkdir(&self, req: &MkdirRequest) -> Result<FileInfo, ClientError> {
        let path = if req.file_path.starts_with('/') {
            req.file_path.clone()
        } else {
            format!("/{}", req.file_path)
        };

        // The directory may already exist; hand its metadata back instead of
        // tripping over the provider's exists error.
        if req.return_if_exist {
            let meta = self
                .get_json(
                    "/api/filemetas",
                    &[("target", json!([path]).to_string()), ("dlink", "0".into())],
                )
                .await?;
            if meta["errno"].as_i64().unwrap_or(-1) == 0 {
                if let Some(info) = meta["info"].as_array().and_then(|l| l.first()) {
                    if info["errno"].as_i64().unwrap_or(-1) == 0 {
                        let mut file = Self::disk_item(info, req.parent_id.as_deref().unwrap_or(""));
                        if file.file_name.is_empty() {
                            file.file_name = path
                                .trim_end_matches('/')
                                .rsplit('/')
                                .next()
                                .unwrap_or_default()
                                .to_string();
                        }
                        if file.file_path.is_empty() {
                            file.file_path = path.clone();
                        }
                        file.is_folder = true;
                        return Ok(file);
                    }
                }
            }
        }

        let body = self
            .post_form(
                "/api/create",
                &[("a", "commit".into())],
                &[
                    ("path", path.clone()),
                    ("isdir", "1".into()),
                    ("rtype", "0".into()),
                ],
            )
            .await?;
        Self::check_errno(&body, &format!("mkdir {path}"))?;
        Ok(FileInfo {
            file_id: body["fs_id"].as_i64().map(|v| v.to_string()).unwrap_or_default(),
            file_name: path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
            file_path: body["path"].as_str().unwrap_or(&path).to_string(),
            is_folder: true,
            file_size: 0,
            parent_id: req.parent_id.clone().unwrap_or_default(),
            created_at: body["ctime"].as_i64().unwrap_or_default().to_string(),
            updated_at: body["mtime"].as_i64().unwrap_or_default().to_string(),
            file_ext: Value::Null,
        })
    }

    async fn remove(&self, req: &RemoveRequest) -> Result<bool, ClientError> {
        if req.file_paths.is_empty() {
            if !req.file_ids.is_empty() {
                return Err(ClientError::Unsupported(
                    "baidu deletion is path-addressed; ids alone are not enough".into(),
                ));
            }
            return Ok(true);
        }
        let paths: Vec<String> = req
            .file_paths
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| if p.starts_with('/') { p.clone() } else { format!("/{p}") })
            .collect();
        let body = self
            .post_form(
                "/api/filemanager",
                &[("opera", "delete".into()), ("async", "0".into())],
                &[("filelist", json!(paths).to_string())],
            )
            .await?;
        Self::check_errno(&body, "delete")?;
        Ok(true)
    }

    async fn transfer(&self, req: &TransferRequest) -> Result<bool, ClientError> {
        req.check_correspondence()?;
        if req.source == SourceKind::Link {
            return Err(ClientError::Unsupported(
                "baidu adapter cannot transfer from link shares".into(),
            ));
        }
        if req.file_ids.is_empty() {
            return Ok(true);
        }

        let msg_id = req.ext_str("msg_id").ok_or_else(|| ClientError::Provider {
            code: -1,
            message: "friend/group transfer requires msg_id in file_ext".into(),
        })?;
        let from_uk = match req.source {
            SourceKind::Friend => req.source_id.clone(),
            _ => req.ext_str("from_uk").ok_or_else(|| ClientError::Provider {
                code: -1,
                message: "group transfer requires from_uk in file_ext".into(),
            })?,
        };
        let to_uk = self.current_uk().await?;
        let kind = if req.source == SourceKind::Friend { "1" } else { "2" };

        // fs_ids are numeric on the wire.
        let fsids: Vec<Value> = req
            .file_ids
            .iter()
            .map(|id| id.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(id)))
            .collect();

        let mut query = vec![
            ("from_uk", from_uk),
            ("to_uk", to_uk),
            ("msg_id", msg_id),
            ("type", kind.to_string()),
            ("ondup", "newcopy".into()),
            ("async", "1".into()),
        ];
        if req.source == SourceKind::Group {
            query.push(("gid", req.source_id.clone()));
        }

        let body = self
            .post_form(
                "/mbox/msg/transfer",
                &query,
                &[
                    ("path", req.target_path.replace('\\', "/")),
                    ("fsids", json!(fsids).to_string()),
                ],
            )
            .await?;
        match body["errno"].as_i64().unwrap_or(0) {
            0 => Ok(true),
            code => {
                warn!(code, "baidu transfer rejected");
                Err(Self::map_errno(code, "transfer"))
            }
        }
    }

    async fn create_share(&self, req: &CreateShareRequest) -> Result<ShareInfo, ClientError> {
        let fid_list: Vec<Value> = req
            .file_ids
            .iter()
            .map(|id| id.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(id)))
            .collect();
        let mut form = vec![
            ("fid_list", json!(fid_list).to_string()),
            ("period", req.expired_type.days().to_string()),
        ];
        match &req.password {
            Some(pwd) => {
                form.push(("schannel", "4".into()));
                form.push(("pwd", pwd.clone()));
            }
            None => form.push(("schannel", "0".into())),
        }
        let body = self.post_form("/share/set", &[], &form).await?;
        Self::check_errno(&body, "share set")?;
        Ok(ShareInfo {
            title: req.file_name.clone(),
            share_id: body["shareid"].as_i64().map(|v| v.to_string()).unwrap_or_default(),
            pwd_id: String::new(),
            url: body["link"].as_str().unwrap_or_default().to_string(),
            password: body["passwd"]
                .as_str()
                .map(str::to_string)
                .or_else(|| req.password.clone())
                .unwrap_or_default(),
            expired_type: req.expired_type.days(),
            expired_at: body["expiretime"]
                .as_i64()
                .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
            expired_left: None,
            view_count: 0,
            audit_status: 1,
            status: 1,
            file_id: req.file_ids.first().cloned(),
            file_size: None,
            path_info: None,
        })
    }

    async fn cancel_share(&self, req: &CancelShareRequest) -> Result<bool, ClientError> {
        let ids: Vec<Value> = req
            .share_ids
            .iter()
            .map(|id| id.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(id)))
            .collect();
        let body = self
            .post_form("/share/cancel", &[], &[("shareid_list", json!(ids).to_string())])
            .await?;
        Self::check_errno(&body, "share cancel")?;
        Ok(true)
    }
}
