use skysync_domain::DriveType;
use thiserror::Error;

/// Typed provider failures. Adapters translate their provider's error
/// dictionary into these variants; the engine's error policy switches on the
/// variant, never on message text.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Provider rejected the stored credentials. Callers mark the owning
    /// account invalid.
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Path resolution hit a file where a directory was required.
    #[error("invalid path: {0}")]
    PathInvalid(String),

    /// Provider refused because of an in-flight competing operation
    /// (Baidu error 111 family).
    #[error("provider conflict, unfinished task pending: {0}")]
    Conflict(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    /// Transport failure, timeout, or undecodable response body.
    #[error("network error: {0}")]
    Network(String),

    #[error("storage quota exceeded: {0}")]
    Quota(String),

    /// More items in one batched call than the provider accepts.
    #[error("batch limit exceeded: {0}")]
    BatchLimit(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The adapter does not implement this operation for this provider.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// No client builder registered for the provider tag.
    #[error("no client registered for drive type: {0}")]
    NotConfigured(DriveType),

    /// Any provider response code without a more specific mapping.
    #[error("provider error_code: {code}, {message}")]
    Provider { code: i64, message: String },
}

impl ClientError {
    /// Wrap a reqwest failure (connect, timeout, body decode) as a
    /// network-class error.
    pub fn network(context: &str, err: reqwest::Error) -> Self {
        ClientError::Network(format!("{context}: {err}"))
    }
}
