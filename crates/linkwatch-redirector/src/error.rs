use linkwatch_core::{ShortCode, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedirectorError>;

#[derive(Debug, Error)]
pub enum RedirectorError {
    #[error("short code not found: {0}")]
    NotFound(ShortCode),
    #[error("click on {code} kept conflicting after {attempts} attempts")]
    ClickConflict { code: ShortCode, attempts: u32 },
    #[error("storage operation failed: {0}")]
    Storage(
        #[from]
        #[source]
        StorageError,
    ),
}
