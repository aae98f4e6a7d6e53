use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid cron expression '{expr}': {message}")]
    InvalidCron { expr: String, message: String },

    #[error(transparent)]
    Store(#[from] skysync_store::StoreError),
}
