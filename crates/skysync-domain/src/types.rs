use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DomainError;

// ── Provider tag ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveType {
    Baidu,
    Quark,
}

impl std::fmt::Display for DriveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveType::Baidu => write!(f, "baidu"),
            DriveType::Quark => write!(f, "quark"),
        }
    }
}

impl FromStr for DriveType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baidu" => Ok(DriveType::Baidu),
            "quark" => Ok(DriveType::Quark),
            other => Err(DomainError::InvalidDriveType(other.to_string())),
        }
    }
}

// ── Sync strategy ─────────────────────────────────────────────────────────────

/// How a configuration materializes differences between source and target.
///
/// - `Incremental`: copy files missing on the target; never delete.
/// - `Full`: incremental plus deletion of target entries absent from source.
/// - `Overwrite`: wipe the target root, then one batched transfer of the
///   source root. No recursion; providers copy directories server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMethod {
    Incremental,
    Full,
    Overwrite,
}

impl std::fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMethod::Incremental => write!(f, "incremental"),
            SyncMethod::Full => write!(f, "full"),
            SyncMethod::Overwrite => write!(f, "overwrite"),
        }
    }
}

impl FromStr for SyncMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "incremental" => Ok(SyncMethod::Incremental),
            "full" => Ok(SyncMethod::Full),
            "overwrite" => Ok(SyncMethod::Overwrite),
            other => Err(DomainError::InvalidMethod(other.to_string())),
        }
    }
}

// ── Speed throttle ────────────────────────────────────────────────────────────

/// Client-side pacing between batched provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl Speed {
    /// Decode the persisted integer form: 0 normal, 1 slow, 2 fast.
    /// Unknown values fall back to normal.
    pub fn from_db(v: i16) -> Self {
        match v {
            1 => Speed::Slow,
            2 => Speed::Fast,
            _ => Speed::Normal,
        }
    }

    pub fn to_db(self) -> i16 {
        match self {
            Speed::Normal => 0,
            Speed::Slow => 1,
            Speed::Fast => 2,
        }
    }

    /// Pause applied after a batched transfer.
    pub fn transfer_pause(self) -> Duration {
        match self {
            Speed::Slow => Duration::from_secs(2),
            Speed::Normal => Duration::from_secs(1),
            Speed::Fast => Duration::ZERO,
        }
    }

    /// Pause applied after a batched delete.
    pub fn delete_pause(self) -> Duration {
        match self {
            Speed::Slow => Duration::from_secs(3),
            Speed::Normal => Duration::from_secs(1),
            Speed::Fast => Duration::ZERO,
        }
    }
}

impl std::fmt::Display for Speed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speed::Slow => write!(f, "slow"),
            Speed::Normal => write!(f, "normal"),
            Speed::Fast => write!(f, "fast"),
        }
    }
}

// ── Share addressing ──────────────────────────────────────────────────────────

/// How a share is addressed on the provider side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Public share link (URL, optionally with password).
    Link,
    /// A friend's share event stream.
    Friend,
    /// A group's share event stream.
    Group,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Link => write!(f, "link"),
            SourceKind::Friend => write!(f, "friend"),
            SourceKind::Group => write!(f, "group"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "link" => Ok(SourceKind::Link),
            "friend" => Ok(SourceKind::Friend),
            "group" => Ok(SourceKind::Group),
            other => Err(DomainError::InvalidSourceKind(other.to_string())),
        }
    }
}

/// Scope selector for share-info listings: an external link or the logged-in
/// user's own shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareScope {
    Link,
    Local,
}

// ── Share expiry ──────────────────────────────────────────────────────────────

/// Normalized share lifetime as a day count. Providers use their own
/// enumerations; adapters translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpiredType {
    Forever,
    OneDay,
    SevenDays,
    ThirtyDays,
    OneYear,
}

impl ExpiredType {
    /// Validate a raw day count at the schema boundary.
    pub fn from_days(days: i64) -> Result<Self, DomainError> {
        match days {
            0 => Ok(ExpiredType::Forever),
            1 => Ok(ExpiredType::OneDay),
            7 => Ok(ExpiredType::SevenDays),
            30 => Ok(ExpiredType::ThirtyDays),
            365 => Ok(ExpiredType::OneYear),
            other => Err(DomainError::InvalidExpiredType(other)),
        }
    }

    pub fn days(self) -> i64 {
        match self {
            ExpiredType::Forever => 0,
            ExpiredType::OneDay => 1,
            ExpiredType::SevenDays => 7,
            ExpiredType::ThirtyDays => 30,
            ExpiredType::OneYear => 365,
        }
    }
}

// ── File & share entities ─────────────────────────────────────────────────────

/// One entry of a single-level listing, on either side of the diff.
///
/// `file_ext` is an opaque, provider-tagged bag carried verbatim from listing
/// to transfer (e.g. `{msg_id, from_uk}` for friend-share items,
/// `{pwd_id, stoken, share_fid_token, pdir_fid}` for link-share items). The
/// engine forwards it without inspecting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_id: String,
    pub file_name: String,
    /// Absolute posix path within its tree.
    pub file_path: String,
    pub is_folder: bool,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub file_ext: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub title: String,
    pub share_id: String,
    #[serde(default)]
    pub pwd_id: String,
    pub url: String,
    #[serde(default)]
    pub password: String,
    /// Day count, or a provider `-1` marker for an already-expired share.
    pub expired_type: i64,
    pub expired_at: Option<chrono::DateTime<chrono::Utc>>,
    pub expired_left: Option<i64>,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub audit_status: i32,
    #[serde(default)]
    pub status: i32,
    pub file_id: Option<String>,
    pub file_size: Option<u64>,
    pub path_info: Option<String>,
}

impl ShareInfo {
    /// A share is dead when the provider flags it expired or its remaining
    /// lifetime has gone negative.
    pub fn is_expired(&self) -> bool {
        self.expired_type == -1 || self.expired_left.map_or(false, |left| left < 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub quota: u64,
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub is_vip: bool,
    #[serde(default)]
    pub is_supervip: bool,
}

// ── Sync endpoints ────────────────────────────────────────────────────────────

/// The share side of a sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDef {
    pub source: SourceKind,
    pub source_id: String,
    /// Path inside the share to sync from.
    pub file_path: String,
    /// Base extension parameters merged under every transfer's ext payload.
    #[serde(default)]
    pub ext_params: Value,
}

impl SourceDef {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.source == SourceKind::Link && self.source_id.trim().is_empty() {
            return Err(DomainError::EmptySourceId);
        }
        Ok(())
    }
}

/// The own-drive side of a sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDef {
    pub file_path: String,
    pub file_id: String,
}

// ── Persisted JSON metadata records ───────────────────────────────────────────

/// Parsed form of `sync_config.src_meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrcMeta {
    pub source_type: SourceKind,
    pub source_id: String,
    #[serde(default)]
    pub ext_params: Value,
}

/// Parsed form of `sync_config.dst_meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DstMeta {
    pub file_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_type_round_trips_through_str() {
        for (s, t) in [("baidu", DriveType::Baidu), ("quark", DriveType::Quark)] {
            assert_eq!(s.parse::<DriveType>().unwrap(), t);
            assert_eq!(t.to_string(), s);
        }
        assert!("dropbox".parse::<DriveType>().is_err());
    }

    #[test]
    fn speed_db_mapping_matches_storage_convention() {
        assert_eq!(Speed::from_db(0), Speed::Normal);
        assert_eq!(Speed::from_db(1), Speed::Slow);
        assert_eq!(Speed::from_db(2), Speed::Fast);
        // unknown values degrade to normal
        assert_eq!(Speed::from_db(9), Speed::Normal);
        assert_eq!(Speed::Fast.transfer_pause(), Duration::ZERO);
        assert_eq!(Speed::Slow.delete_pause(), Duration::from_secs(3));
    }

    #[test]
    fn expired_type_rejects_off_menu_day_counts() {
        assert!(ExpiredType::from_days(7).is_ok());
        assert!(ExpiredType::from_days(365).is_ok());
        assert!(ExpiredType::from_days(14).is_err());
        assert!(ExpiredType::from_days(-1).is_err());
    }

    #[test]
    fn link_source_requires_source_id() {
        let def = SourceDef {
            source: SourceKind::Link,
            source_id: "  ".into(),
            file_path: "/".into(),
            ext_params: Value::Null,
        };
        assert!(def.validate().is_err());

        let ok = SourceDef {
            source: SourceKind::Friend,
            source_id: String::new(),
            file_path: "/".into(),
            ext_params: Value::Null,
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn share_info_expiry_detection() {
        let mut share = ShareInfo {
            title: "t".into(),
            share_id: "1".into(),
            pwd_id: String::new(),
            url: String::new(),
            password: String::new(),
            expired_type: 7,
            expired_at: None,
            expired_left: Some(3),
            view_count: 0,
            audit_status: 1,
            status: 1,
            file_id: None,
            file_size: None,
            path_info: None,
        };
        assert!(!share.is_expired());
        share.expired_left = Some(-1);
        assert!(share.is_expired());
        share.expired_left = None;
        share.expired_type = -1;
        assert!(share.is_expired());
    }

    #[test]
    fn src_meta_parses_with_defaulted_ext_params() {
        let meta: SrcMeta =
            serde_json::from_str(r#"{"source_type": "friend", "source_id": "12345"}"#).unwrap();
        assert_eq!(meta.source_type, SourceKind::Friend);
        assert!(meta.ext_params.is_null());
    }
}
