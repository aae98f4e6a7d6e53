use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown drive type: {0}")]
    InvalidDriveType(String),

    #[error("unknown sync method: {0}")]
    InvalidMethod(String),

    #[error("unknown share source type: {0}")]
    InvalidSourceKind(String),

    #[error("share source of type 'link' requires a non-empty source_id")]
    EmptySourceId,

    #[error("invalid expiry period: {0} days (expected one of 0, 1, 7, 30, 365)")]
    InvalidExpiredType(i64),

    #[error("invalid metadata: {0}")]
    InvalidMeta(String),
}
