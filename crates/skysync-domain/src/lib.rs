pub mod error;
pub mod types;

pub use error::DomainError;
pub use types::{
    DriveType, DstMeta, ExpiredType, FileInfo, ShareInfo, ShareScope, SourceDef, SourceKind,
    Speed, SrcMeta, SyncMethod, TargetDef, UserInfo,
};
