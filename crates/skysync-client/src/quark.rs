use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use skysync_domain::{
    DriveType, ExpiredType, FileInfo, ShareInfo, ShareScope, SourceKind, UserInfo,
};
use tracing::{debug, warn};

use crate::client::{
    CancelShareRequest, CreateShareRequest, DriveClient, ListDiskRequest, ListShareRequest,
    MkdirRequest, RemoveRequest, ShareInfoRequest, TransferRequest,
};
use crate::error::ClientError;

const PAGE_SIZE: u32 = 50;
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const TASK_POLL_LIMIT: u32 = 10;
const TASK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Share-save / share-create task states.
const TASK_DONE: i64 = 2;
const TASK_FAILED: i64 = 3;

/// Directory-exists code returned by the folder-create endpoint.
const CODE_ALREADY_EXISTS: i64 = 23008;

// ── Base URLs (overridden in tests to point at a mock server) ─────────────────

#[derive(Clone, Debug)]
struct BaseUrls {
    drive: String,
    pan: String,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            drive: "https://drive-pc.quark.cn".into(),
            pan: "https://pan.quark.cn".into(),
        }
    }
}

// ── Share URL parsing ─────────────────────────────────────────────────────────

/// Split a share source id of the form
/// `https://pan.quark.cn/s/<pwd_id>[?pwd=<password>]` into its parts.
fn parse_share_source(source_id: &str) -> (String, String) {
    let (url, password) = match source_id.split_once("?pwd=") {
        Some((url, pwd)) => (url, pwd.to_string()),
        None => (source_id, String::new()),
    };
    let pwd_id = url
        .split_once("/s/")
        .map(|(_, tail)| tail)
        .unwrap_or(url)
        .trim_matches('/')
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_string();
    (pwd_id, password)
}

// ── QuarkClient ───────────────────────────────────────────────────────────────

/// Adapter for the Quark drive API.
///
/// Everything is id-addressed (`fid` / `pdir_fid`). Link shares resolve via
/// `pwd_id` → `stoken`; each listed share item carries its `share_fid_token`,
/// which the save endpoint needs back in the same order as the fid list.
/// Friend/group shares do not exist on this provider.
#[derive(Debug)]
pub struct QuarkClient {
    http: reqwest::Client,
    cookies: String,
    base: BaseUrls,
}

impl QuarkClient {
    pub fn new(cookies: &str) -> Result<Self, ClientError> {
        Self::with_base(cookies, BaseUrls::default())
    }

    fn with_base(cookies: &str, base: BaseUrls) -> Result<Self, ClientError> {
        if cookies.trim().is_empty() {
            return Err(ClientError::Auth("empty cookie string".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Network(format!("http client init: {e}")))?;
        Ok(Self { http, cookies: cookies.to_string(), base })
    }

    #[cfg(test)]
    fn for_tests(cookies: &str, server_uri: &str) -> Self {
        Self::with_base(
            cookies,
            BaseUrls { drive: server_uri.to_string(), pan: server_uri.to_string() },
        )
        .unwrap()
    }

    // ── HTTP helpers ──────────────────────────────────────────────────────────

    async fn decode(resp: reqwest::Response, context: &str) -> Result<Value, ClientError> {
        match resp.status().as_u16() {
            401 => return Err(ClientError::Auth(format!("{context}: http 401"))),
            403 => return Err(ClientError::PermissionDenied(format!("{context}: http 403"))),
            429 => return Err(ClientError::RateLimit(format!("{context}: http 429"))),
            _ => {}
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("{context} decode: {e}")))?;
        Self::check_code(&body, context)?;
        Ok(body)
    }

    /// Quark envelopes carry `code` as either `0` or `"OK"`.
    fn check_code(body: &Value, context: &str) -> Result<(), ClientError> {
        let ok = match &body["code"] {
            Value::Number(n) => n.as_i64() == Some(0),
            Value::String(s) => s == "OK" || s == "0",
            Value::Null => true,
            _ => false,
        };
        if ok {
            return Ok(());
        }
        let code = body["code"].as_i64().unwrap_or(-1);
        let message = body["message"].as_str().unwrap_or("unknown error").to_string();
        Err(match code {
            31001 | 41013 => ClientError::NotFound(format!("{context}: {message}")),
            32003 => ClientError::Quota(format!("{context}: {message}")),
            _ => ClientError::Provider { code, message: format!("{context}: {message}") },
        })
    }

    async fn get_json(
        &self,
        base: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ClientError> {
        let url = format!("{base}{path}");
        debug!(%url, "quark GET");
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::COOKIE, &self.cookies)
            .query(query)
            .send()
            .await
            .map_err(|e| ClientError::network(path, e))?;
        Self::decode(resp, path).await
    }

    async fn post_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base.drive, path);
        debug!(%url, "quark POST");
        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::COOKIE, &self.cookies)
            .query(query)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::network(path, e))?;
        Self::decode(resp, path).await
    }

    // ── Conversions ───────────────────────────────────────────────────────────

    fn disk_item(item: &Value, parent_path: &str, parent_id: &str) -> FileInfo {
        let name = item["file_name"].as_str().unwrap_or_default();
        FileInfo {
            file_id: item["fid"].as_str().unwrap_or_default().to_string(),
            file_name: name.to_string(),
            file_path: format!("{}/{}", parent_path.trim_end_matches('/'), name),
            is_folder: item["dir"].as_bool().unwrap_or(false),
            file_size: item["size"].as_u64().unwrap_or(0),
            parent_id: parent_id.to_string(),
            created_at: item["created_at"].as_i64().unwrap_or_default().to_string(),
            updated_at: item["updated_at"].as_i64().unwrap_or_default().to_string(),
            file_ext: Value::Null,
        }
    }

    /// Translate the normalized day count to Quark's expiry enumeration.
    fn expired_code(expired: ExpiredType) -> i64 {
        match expired {
            ExpiredType::OneDay => 2,
            ExpiredType::SevenDays => 3,
            ExpiredType::ThirtyDays => 4,
            // Forever, and anything the provider has no code for.
            _ => 1,
        }
    }

    fn millis_to_datetime(v: &Value) -> Option<DateTime<Utc>> {
        v.as_i64()
            .filter(|ms| *ms > 0)
            .and_then(|ms| DateTime::<Utc>::from_timestamp(ms / 1000, 0))
    }

    // ── Share plumbing ────────────────────────────────────────────────────────

    async fn share_token(&self, pwd_id: &str, password: &str) -> Result<String, ClientError> {
        let body = self
            .post_json(
                "/1/clouddrive/share/sharepage/token",
                &[],
                &json!({ "pwd_id": pwd_id, "passcode": password }),
            )
            .await?;
        let stoken = body["data"]["stoken"].as_str().unwrap_or_default();
        if stoken.is_empty() {
            return Err(ClientError::PermissionDenied(format!(
                "share {pwd_id}: no stoken issued (wrong password?)"
            )));
        }
        Ok(stoken.to_string())
    }

    /// One level of a link share, paginated until `_count` drops below a page.
    async fn share_level(
        &self,
        pwd_id: &str,
        stoken: &str,
        pdir_fid: &str,
    ) -> Result<Vec<Value>, ClientError> {
        let mut page = 1u32;
        let mut items = Vec::new();
        loop {
            let body = self
                .get_json(
                    &self.base.drive,
                    "/1/clouddrive/share/sharepage/detail",
                    &[
                        ("pwd_id", pwd_id.to_string()),
                        ("stoken", stoken.to_string()),
                        ("pdir_fid", pdir_fid.to_string()),
                        ("_page", page.to_string()),
                        ("_size", PAGE_SIZE.to_string()),
                        ("_sort", "file_type:asc,file_name:asc".into()),
                    ],
                )
                .await?;
            items.extend(body["data"]["list"].as_array().cloned().unwrap_or_default());
            let count = body["data"]["metadata"]["_count"].as_u64().unwrap_or(0);
            if count < PAGE_SIZE as u64 {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    async fn query_task(&self, task_id: &str, retry_index: u32) -> Result<Value, ClientError> {
        let body = self
            .get_json(
                &self.base.drive,
                "/1/clouddrive/task",
                &[
                    ("task_id", task_id.to_string()),
                    ("retry_index", retry_index.to_string()),
                ],
            )
            .await?;
        Ok(body["data"].clone())
    }
}

#[async_trait]
impl DriveClient for QuarkClient {
    fn drive_type(&self) -> DriveType {
        DriveType::Quark
    }

    async fn get_user_info(&self) -> Result<UserInfo, ClientError> {
        let account = self
            .get_json(&self.base.pan, "/account/info", &[("fr", "pc".into())])
            .await?;
        let member = self
            .get_json(&self.base.drive, "/1/clouddrive/member", &[])
            .await?;
        let acc = &account["data"];
        let mem = &member["data"];
        Ok(UserInfo {
            user_id: acc["mobilekps"].as_str().unwrap_or_default().to_string(),
            username: acc["nickname"].as_str().unwrap_or_default().to_string(),
            avatar_url: acc["avatarUri"].as_str().unwrap_or_default().to_string(),
            quota: mem["total_capacity"].as_u64().unwrap_or(0),
            used: mem["use_capacity"].as_u64().unwrap_or(0),
            is_vip: mem["is_vip"].as_bool().unwrap_or(false),
            is_supervip: mem["member_type"].as_str() == Some("SUPER_VIP"),
        })
    }

    async fn list_disk(&self, req: &ListDiskRequest) -> Result<Vec<FileInfo>, ClientError> {
        let pdir_fid = req
            .file_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| "0".into());
        let mut page = 1u32;
        let mut files = Vec::new();
        loop {
            let body = self
                .get_json(
                    &self.base.drive,
                    "/1/clouddrive/file/sort",
                    &[
                        ("pdir_fid", pdir_fid.clone()),
                        ("_page", page.to_string()),
                        ("_size", PAGE_SIZE.to_string()),
                        ("_fetch_total", "1".into()),
                        ("_sort", "file_type:asc,file_name:asc".into()),
                    ],
                )
                .await?;
            let items = body["data"]["list"].as_array().cloned().unwrap_or_default();
            files.extend(items.iter().map(|i| Self::disk_item(i, &req.file_path, &pdir_fid)));
            let count = body["metadata"]["_count"]
                .as_u64()
                .or_else(|| body["data"]["metadata"]["_count"].as_u64())
                .unwrap_or(items.len() as u64);
            if count < PAGE_SIZE as u64 {
                break;
            }
            page += 1;
        }
        Ok(files)
    }

    async fn list_share(&self, req: &ListShareRequest) -> Result<Vec<FileInfo>, ClientError> {
        if req.source != SourceKind::Link {
            return Err(ClientError::Unsupported(format!(
                "quark adapter has no {} shares",
                req.source
            )));
        }
        let (pwd_id, password) = parse_share_source(&req.source_id);
        let stoken = self.share_token(&pwd_id, &password).await?;

        let mut pdir_fid = "0".to_string();
        let mut path = String::new();
        let mut items = self.share_level(&pwd_id, &stoken, &pdir_fid).await?;

        let components: Vec<&str> = req
            .file_path
            .trim_matches('/')
            .split('/')
            .filter(|c| !c.is_empty())
            .collect();

        for (idx, component) in components.iter().enumerate() {
            let hit = items
                .iter()
                .find(|item| item["file_name"].as_str() == Some(*component))
                .cloned()
                .ok_or_else(|| {
                    ClientError::NotFound(format!("path component '{component}' not in share"))
                })?;
            let is_dir = hit["dir"].as_bool().unwrap_or(false);
            let is_last = idx == components.len() - 1;
            if !is_dir && !is_last {
                return Err(ClientError::PathInvalid(format!(
                    "'{component}' is a file but the path continues"
                )));
            }
            path = format!("{path}/{component}");
            if is_dir {
                pdir_fid = hit["fid"].as_str().unwrap_or_default().to_string();
                items = self.share_level(&pwd_id, &stoken, &pdir_fid).await?;
            } else {
                // target is a single file; list it as itself
                items = vec![hit];
                path = path.rsplit_once('/').map(|(p, _)| p.to_string()).unwrap_or_default();
            }
        }

        Ok(items
            .iter()
            .map(|item| {
                let mut file = Self::disk_item(item, &path, &pdir_fid);
                file.file_ext = json!({
                    "pwd_id": pwd_id,
                    "stoken": stoken,
                    "share_url": req.source_id,
                    "share_fid_token": item["share_fid_token"].as_str().unwrap_or_default(),
                    "pdir_fid": pdir_fid,
                });
                file
            })
            .collect())
    }

    async fn list_share_info(&self, req: &ShareInfoRequest) -> Result<Vec<ShareInfo>, ClientError> {
        match req.scope {
            ShareScope::Link => {
                let (pwd_id, password) = parse_share_source(&req.source_id);
                let stoken = self.share_token(&pwd_id, &password).await?;
                let body = self
                    .get_json(
                        &self.base.drive,
                        "/1/clouddrive/share/sharepage/detail",
                        &[
                            ("pwd_id", pwd_id.clone()),
                            ("stoken", stoken),
                            ("pdir_fid", "0".into()),
                            ("_page", "1".into()),
                            ("_size", "1".into()),
                        ],
                    )
                    .await?;
                let share = &body["data"]["share"];
                Ok(vec![ShareInfo {
                    title: share["title"].as_str().unwrap_or_default().to_string(),
                    share_id: share["share_id"].as_str().unwrap_or_default().to_string(),
                    pwd_id: share["pwd_id"].as_str().unwrap_or(&pwd_id).to_string(),
                    url: share["share_url"].as_str().unwrap_or_default().to_string(),
                    password: share["passcode"].as_str().unwrap_or_default().to_string(),
                    expired_type: share["expired_type"].as_i64().unwrap_or(0),
                    expired_at: Self::millis_to_datetime(&share["expired_at"]),
                    expired_left: share["expired_left"].as_i64(),
                    view_count: share["click_pv"].as_i64().unwrap_or(0),
                    audit_status: share["audit_status"].as_i64().unwrap_or(0) as i32,
                    status: share["status"].as_i64().unwrap_or(0) as i32,
                    file_id: share["first_fid"].as_str().map(str::to_string),
                    file_size: share["size"].as_u64(),
                    path_info: share["path_info"].as_str().map(str::to_string),
                }])
            }
            ShareScope::Local => {
                let body = self
                    .get_json(
                        &self.base.drive,
                        "/1/clouddrive/share/mypage/detail",
                        &[
                            ("_page", req.page.to_string()),
                            ("_size", req.size.to_string()),
                            ("_order_field", "created_at".into()),
                            ("_order_type", if req.desc { "desc" } else { "asc" }.into()),
                        ],
                    )
                    .await?;
                Ok(body["data"]["list"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|item| ShareInfo {
                        title: item["title"].as_str().unwrap_or_default().to_string(),
                        share_id: item["share_id"].as_str().unwrap_or_default().to_string(),
                        pwd_id: item["pwd_id"].as_str().unwrap_or_default().to_string(),
                        url: item["share_url"].as_str().unwrap_or_default().to_string(),
                        password: item["passcode"].as_str().unwrap_or_default().to_string(),
                        expired_type: item["expired_type"].as_i64().unwrap_or(0),
                        expired_at: Self::millis_to_datetime(&item["expired_at"]),
                        expired_left: item["expired_left"].as_i64(),
                        view_count: item["click_pv"].as_i64().unwrap_or(0),
                        audit_status: item["audit_status"].as_i64().unwrap_or(0) as i32,
                        status: item["status"].as_i64().unwrap_or(0) as i32,
                        file_id: item["first_fid"].as_str().map(str::to_string),
                        file_size: item["size"].as_u64(),
                        path_info: item["path_info"].as_str().map(str::to_string),
                    })
                    .collect())
            }
        }
    }

    async fn mkdir(&self, req: &MkdirRequest) -> Result<FileInfo, ClientError> {
        let pdir_fid = req
            .parent_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| "0".into());
        let name = req
            .file_name
            .clone()
            .unwrap_or_else(|| {
                req.file_path
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });

        let created = self
            .post_json(
                "/1/clouddrive/file",
                &[],
                &json!({ "pdir_fid": pdir_fid, "file_name": name, "dir_init_lock": false }),
            )
            .await;

        let fid = match created {
            Ok(body) => body["data"]["fid"].as_str().unwrap_or_default().to_string(),
            Err(ClientError::Provider { code: CODE_ALREADY_EXISTS, .. }) if req.return_if_exist => {
                // Fall back to a parent listing to recover the existing fid.
                let siblings = self
                    .list_disk(&ListDiskRequest {
                        file_path: req
                            .file_path
                            .rsplit_once('/')
                            .map(|(p, _)| p.to_string())
                            .unwrap_or_else(|| "/".into()),
                        file_id: Some(pdir_fid.clone()),
                        desc: false,
                    })
                    .await?;
                siblings
                    .into_iter()
                    .find(|f| f.is_folder && f.file_name == name)
                    .map(|f| f.file_id)
                    .ok_or_else(|| {
                        ClientError::NotFound(format!("existing folder '{name}' not listed"))
                    })?
            }
            Err(e) => return Err(e),
        };

        Ok(FileInfo {
            file_id: fid,
            file_name: name,
            file_path: req.file_path.clone(),
            is_folder: true,
            file_size: 0,
            parent_id: pdir_fid,
            created_at: String::new(),
            updated_at: String::new(),
            file_ext: Value::Null,
        })
    }

    async fn remove(&self, req: &RemoveRequest) -> Result<bool, ClientError> {
        if req.file_ids.is_empty() {
            if !req.file_paths.is_empty() {
                return Err(ClientError::Unsupported(
                    "quark deletion is id-addressed; paths alone are not enough".into(),
                ));
            }
            return Ok(true);
        }
        self.post_json(
            "/1/clouddrive/file/delete",
            &[],
            &json!({ "action_type": 2, "filelist": req.file_ids, "exclude_fids": [] }),
        )
        .await?;
        Ok(true)
    }

    async fn transfer(&self, req: &TransferRequest) -> Result<bool, ClientError> {
        req.check_correspondence()?;
        if req.source != SourceKind::Link {
            return Err(ClientError::Unsupported(format!(
                "quark adapter cannot transfer from {} shares",
                req.source
            )));
        }
        if req.file_ids.is_empty() {
            return Ok(true);
        }

        let (pwd_id, _) = parse_share_source(&req.source_id);
        let stoken = req.ext_str("stoken").ok_or_else(|| ClientError::Provider {
            code: -1,
            message: "link transfer requires the stoken captured at listing time".into(),
        })?;
        let to_pdir_fid = req
            .target_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| req.ext_str("to_pdir_fid"))
            .ok_or_else(|| ClientError::Provider {
                code: -1,
                message: format!("no target folder id for '{}'", req.target_path),
            })?;
        let pdir_fid = req.ext_str("pdir_fid").ok_or_else(|| ClientError::Provider {
            code: -1,
            message: "link transfer requires the share-side parent fid".into(),
        })?;

        // fid_token_list mirrors file_ids index-for-index; correspondence was
        // checked above, so each entry's token belongs to its id.
        let fid_token_list: Vec<String> = req
            .files_ext
            .iter()
            .map(|e| {
                e.file_ext
                    .get("share_fid_token")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();

        let body = self
            .post_json(
                "/1/clouddrive/share/sharepage/save",
                &[],
                &json!({
                    "pwd_id": pwd_id,
                    "stoken": stoken,
                    "to_pdir_fid": to_pdir_fid,
                    "pdir_fid": pdir_fid,
                    "pack_dir_name": "",
                    "pdir_save_all": false,
                    "scene": "link",
                    "fid_list": req.file_ids,
                    "fid_token_list": fid_token_list,
                    "exclude_fids": [],
                }),
            )
            .await?;

        // The save runs as a provider-side task; acceptance is success here.
        if body["data"]["task_id"].as_str().is_none() {
            warn!("quark save accepted without a task id");
        }
        Ok(true)
    }

    async fn create_share(&self, req: &CreateShareRequest) -> Result<ShareInfo, ClientError> {
        let body = self
            .post_json(
                "/1/clouddrive/share",
                &[],
                &json!({
                    "fid_list": req.file_ids,
                    "title": req.file_name,
                    "url_type": 1,
                    "expired_type": Self::expired_code(req.expired_type),
                }),
            )
            .await?;
        let task_id = body["data"]["task_id"]
            .as_str()
            .ok_or_else(|| ClientError::Provider {
                code: -1,
                message: "share create returned no task_id".into(),
            })?
            .to_string();

        // Two-phase API: poll the share task until it lands.
        let mut share_id = None;
        for retry in 0..TASK_POLL_LIMIT {
            let task = self.query_task(&task_id, retry).await?;
            match task["status"].as_i64().unwrap_or(0) {
                TASK_DONE => {
                    share_id = task["share_id"].as_str().map(str::to_string);
                    break;
                }
                TASK_FAILED => {
                    return Err(ClientError::Provider {
                        code: -1,
                        message: format!("share task {task_id} failed"),
                    })
                }
                _ => tokio::time::sleep(TASK_POLL_INTERVAL).await,
            }
        }
        let share_id = share_id.ok_or_else(|| ClientError::Provider {
            code: -1,
            message: format!("share task {task_id} did not finish in time"),
        })?;

        let pwd = self
            .post_json(
                "/1/clouddrive/share/password",
                &[],
                &json!({ "share_id": share_id }),
            )
            .await?;
        let data = &pwd["data"];
        Ok(ShareInfo {
            title: data["title"].as_str().unwrap_or(&req.file_name).to_string(),
            share_id,
            pwd_id: data["pwd_id"].as_str().unwrap_or_default().to_string(),
            url: data["share_url"].as_str().unwrap_or_default().to_string(),
            password: data["passcode"].as_str().unwrap_or_default().to_string(),
            expired_type: req.expired_type.days(),
            expired_at: Self::millis_to_datetime(&data["expired_at"]),
            expired_left: None,
            view_count: 0,
            audit_status: 1,
            status: 1,
            file_id: req.file_ids.first().cloned(),
            file_size: data["size"].as_u64(),
            path_info: data["path_info"].as_str().map(str::to_string),
        })
    }

    async fn cancel_share(&self, req: &CancelShareRequest) -> Result<bool, ClientError> {
        self.post_json(
            "/1/clouddrive/share/delete",
            &[],
            &json!({ "share_ids": req.share_ids }),
        )
        .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FileExtEntry;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COOKIES: &str = "__pus=abc; __puus=def";

    #[test]
    fn share_source_parsing_handles_passwords() {
        let (pwd_id, password) = parse_share_source("https://pan.quark.cn/s/abc123?pwd=9z8y");
        assert_eq!(pwd_id, "abc123");
        assert_eq!(password, "9z8y");

        let (pwd_id, password) = parse_share_source("https://pan.quark.cn/s/abc123");
        assert_eq!(pwd_id, "abc123");
        assert_eq!(password, "");
    }

    #[test]
    fn expired_code_translation_matches_provider_menu() {
        assert_eq!(QuarkClient::expired_code(ExpiredType::Forever), 1);
        assert_eq!(QuarkClient::expired_code(ExpiredType::OneDay), 2);
        assert_eq!(QuarkClient::expired_code(ExpiredType::SevenDays), 3);
        assert_eq!(QuarkClient::expired_code(ExpiredType::ThirtyDays), 4);
        assert_eq!(QuarkClient::expired_code(ExpiredType::OneYear), 1);
    }

    #[tokio::test]
    async fn list_share_attaches_per_item_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/clouddrive/share/sharepage/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "data": { "stoken": "st-1" },
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1/clouddrive/share/sharepage/detail"))
            .and(query_param("pdir_fid", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {
                    "list": [
                        { "fid": "f1", "file_name": "a.bin", "dir": false, "size": 5,
                          "share_fid_token": "tok-f1" },
                        { "fid": "d1", "file_name": "sub", "dir": true, "size": 0,
                          "share_fid_token": "tok-d1" },
                    ],
                    "metadata": { "_count": 2 },
                },
            })))
            .mount(&server)
            .await;

        let client = QuarkClient::for_tests(COOKIES, &server.uri());
        let files = client
            .list_share(&ListShareRequest {
                source: SourceKind::Link,
                source_id: "https://pan.quark.cn/s/abc123".into(),
                file_path: "/".into(),
            })
            .await
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_ext["share_fid_token"], "tok-f1");
        assert_eq!(files[0].file_ext["stoken"], "st-1");
        assert_eq!(files[1].file_path, "/sub");
    }

    #[tokio::test]
    async fn transfer_sends_tokens_in_fid_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/clouddrive/share/sharepage/save"))
            .and(body_partial_json(json!({
                "fid_list": ["f1", "f2"],
                "fid_token_list": ["tok-f1", "tok-f2"],
                "to_pdir_fid": "dst-9",
                "scene": "link",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "data": { "task_id": "t1" },
            })))
            .mount(&server)
            .await;

        let client = QuarkClient::for_tests(COOKIES, &server.uri());
        let files_ext = ["f1", "f2"]
            .iter()
            .map(|id| FileExtEntry {
                file_id: id.to_string(),
                file_ext: json!({
                    "stoken": "st-1",
                    "share_fid_token": format!("tok-{id}"),
                    "pdir_fid": "0",
                }),
            })
            .collect();
        let ok = client
            .transfer(&TransferRequest {
                source: SourceKind::Link,
                source_id: "https://pan.quark.cn/s/abc123".into(),
                source_path: "/".into(),
                target_path: "/dst".into(),
                target_id: Some("dst-9".into()),
                file_ids: vec!["f1".into(), "f2".into()],
                files_ext,
                ext_params: Value::Null,
            })
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn transfer_refuses_reordered_ext_entries() {
        let server = MockServer::start().await;
        let client = QuarkClient::for_tests(COOKIES, &server.uri());
        let err = client
            .transfer(&TransferRequest {
                source: SourceKind::Link,
                source_id: "https://pan.quark.cn/s/abc123".into(),
                source_path: "/".into(),
                target_path: "/dst".into(),
                target_id: Some("dst-9".into()),
                file_ids: vec!["f1".into(), "f2".into()],
                files_ext: vec![
                    FileExtEntry { file_id: "f2".into(), file_ext: json!({}) },
                    FileExtEntry { file_id: "f1".into(), file_ext: json!({}) },
                ],
                ext_params: Value::Null,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Provider { .. }));
    }

    #[tokio::test]
    async fn create_share_polls_the_share_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/clouddrive/share"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "data": { "task_id": "task-7" },
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1/clouddrive/task"))
            .and(query_param("task_id", "task-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "data": { "status": 2, "share_id": "sh-1" },
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/1/clouddrive/share/password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {
                    "pwd_id": "p1", "share_url": "https://pan.quark.cn/s/p1",
                    "passcode": "", "title": "res", "expired_at": 1_700_000_000_000i64,
                    "file_num": 1, "size": 9,
                },
            })))
            .mount(&server)
            .await;

        let client = QuarkClient::for_tests(COOKIES, &server.uri());
        let share = client
            .create_share(&CreateShareRequest {
                file_name: "res".into(),
                file_ids: vec!["f1".into()],
                expired_type: ExpiredType::SevenDays,
                password: None,
            })
            .await
            .unwrap();
        assert_eq!(share.share_id, "sh-1");
        assert_eq!(share.pwd_id, "p1");
        assert_eq!(share.expired_type, 7);
        assert!(share.expired_at.is_some());
    }

    #[tokio::test]
    async fn http_401_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/clouddrive/file/sort"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = QuarkClient::for_tests(COOKIES, &server.uri());
        let err = client
            .list_disk(&ListDiskRequest { file_path: "/".into(), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
    }
}
