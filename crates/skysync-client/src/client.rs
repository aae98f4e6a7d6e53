use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skysync_domain::{
    DriveType, ExpiredType, FileInfo, ShareInfo, ShareScope, SourceKind, UserInfo,
};

use crate::error::ClientError;

// ── Request shapes ────────────────────────────────────────────────────────────

/// List one level of the authenticated user's own drive.
#[derive(Debug, Clone, Default)]
pub struct ListDiskRequest {
    /// Absolute path of the directory to list.
    pub file_path: String,
    /// Provider id of the directory, when known. Id-addressed providers
    /// require it for non-root paths; path-addressed providers ignore it.
    pub file_id: Option<String>,
    pub desc: bool,
}

/// List one level inside a share.
#[derive(Debug, Clone)]
pub struct ListShareRequest {
    pub source: SourceKind,
    pub source_id: String,
    /// Path inside the share; `/` is the share root.
    pub file_path: String,
}

/// Query share metadata, either for an external link or for the logged-in
/// user's own shares.
#[derive(Debug, Clone)]
pub struct ShareInfoRequest {
    pub scope: ShareScope,
    pub source_id: String,
    pub page: u32,
    pub size: u32,
    pub desc: bool,
}

#[derive(Debug, Clone)]
pub struct MkdirRequest {
    /// Full path of the directory to create.
    pub file_path: String,
    /// Parent directory id, when the caller knows it.
    pub parent_id: Option<String>,
    /// Directory basename; derived from `file_path` when absent.
    pub file_name: Option<String>,
    /// When set, an existing directory is returned instead of failing.
    pub return_if_exist: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RemoveRequest {
    pub file_paths: Vec<String>,
    pub file_ids: Vec<String>,
    pub parent_id: Option<String>,
}

/// Per-file opaque metadata accompanying a batched transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileExtEntry {
    pub file_id: String,
    #[serde(default)]
    pub file_ext: Value,
}

/// One batched server-side copy from a share into the user's own drive.
///
/// `file_ids` and `files_ext` are parallel: `files_ext[i].file_id` must equal
/// `file_ids[i]`. Adapters rely on this to pair per-file tokens (such as
/// Quark's `share_fid_token`) with the ids they belong to.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source: SourceKind,
    pub source_id: String,
    pub source_path: String,
    pub target_path: String,
    pub target_id: Option<String>,
    pub file_ids: Vec<String>,
    pub files_ext: Vec<FileExtEntry>,
    /// Share-level parameters merged under every file's ext payload.
    pub ext_params: Value,
}

impl TransferRequest {
    /// Enforce the ordered id/token correspondence contract.
    pub fn check_correspondence(&self) -> Result<(), ClientError> {
        if self.file_ids.len() != self.files_ext.len() {
            return Err(ClientError::Provider {
                code: -1,
                message: format!(
                    "transfer ext mismatch: {} file ids but {} ext entries",
                    self.file_ids.len(),
                    self.files_ext.len()
                ),
            });
        }
        for (i, (id, ext)) in self.file_ids.iter().zip(&self.files_ext).enumerate() {
            if *id != ext.file_id {
                return Err(ClientError::Provider {
                    code: -1,
                    message: format!(
                        "transfer ext mismatch at index {i}: id {id} paired with ext for {}",
                        ext.file_id
                    ),
                });
            }
        }
        Ok(())
    }

    /// Look up a share-level ext parameter, falling back to the first file's
    /// ext bag (some providers carry share-wide tokens on each item).
    pub fn ext_str(&self, key: &str) -> Option<String> {
        if let Some(v) = self.ext_params.get(key).and_then(Value::as_str) {
            return Some(v.to_string());
        }
        self.files_ext
            .first()
            .and_then(|e| e.file_ext.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Debug, Clone)]
pub struct CreateShareRequest {
    /// Share title.
    pub file_name: String,
    pub file_ids: Vec<String>,
    pub expired_type: ExpiredType,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CancelShareRequest {
    pub share_ids: Vec<String>,
}

// ── Capability set ────────────────────────────────────────────────────────────

/// The provider capability set. One implementation per supported drive.
///
/// Adapter-wide invariants:
/// - Pagination is internal: every listing returns a complete level.
/// - Item order within a single listing is stable.
/// - `FileInfo::file_ext` of a share item carries everything the adapter
///   needs to later transfer that item.
#[async_trait]
pub trait DriveClient: std::fmt::Debug + Send + Sync + 'static {
    fn drive_type(&self) -> DriveType;

    async fn get_user_info(&self) -> Result<UserInfo, ClientError>;

    async fn list_disk(&self, req: &ListDiskRequest) -> Result<Vec<FileInfo>, ClientError>;

    async fn list_share(&self, req: &ListShareRequest) -> Result<Vec<FileInfo>, ClientError>;

    async fn list_share_info(&self, req: &ShareInfoRequest) -> Result<Vec<ShareInfo>, ClientError>;

    async fn mkdir(&self, req: &MkdirRequest) -> Result<FileInfo, ClientError>;

    async fn remove(&self, req: &RemoveRequest) -> Result<bool, ClientError>;

    async fn transfer(&self, req: &TransferRequest) -> Result<bool, ClientError>;

    async fn create_share(&self, req: &CreateShareRequest) -> Result<ShareInfo, ClientError>;

    async fn cancel_share(&self, req: &CancelShareRequest) -> Result<bool, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transfer_req(ids: &[&str], ext_ids: &[&str]) -> TransferRequest {
        TransferRequest {
            source: SourceKind::Link,
            source_id: "https://example/s/abc".into(),
            source_path: "/".into(),
            target_path: "/dst".into(),
            target_id: None,
            file_ids: ids.iter().map(|s| s.to_string()).collect(),
            files_ext: ext_ids
                .iter()
                .map(|s| FileExtEntry {
                    file_id: s.to_string(),
                    file_ext: json!({"share_fid_token": format!("tok-{s}")}),
                })
                .collect(),
            ext_params: Value::Null,
        }
    }

    #[test]
    fn correspondence_accepts_aligned_batches() {
        assert!(transfer_req(&["a", "b"], &["a", "b"]).check_correspondence().is_ok());
    }

    #[test]
    fn correspondence_rejects_length_mismatch() {
        assert!(transfer_req(&["a", "b"], &["a"]).check_correspondence().is_err());
    }

    #[test]
    fn correspondence_rejects_reordering() {
        assert!(transfer_req(&["a", "b"], &["b", "a"]).check_correspondence().is_err());
    }

    #[test]
    fn ext_str_prefers_share_level_params() {
        let mut req = transfer_req(&["a"], &["a"]);
        req.ext_params = json!({"stoken": "base"});
        assert_eq!(req.ext_str("stoken"), Some("base".into()));
        assert_eq!(req.ext_str("share_fid_token"), Some("tok-a".into()));
        assert_eq!(req.ext_str("missing"), None);
    }
}
