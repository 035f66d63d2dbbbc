use linkwatch_core::{ShortCode, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotifierError>;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("short code not found: {0}")]
    NotFound(ShortCode),
    /// The underlying watch channel failed. The subscription is over; the
    /// link itself may still exist.
    #[error("watch on {code} closed: {reason}")]
    ChannelClosed { code: ShortCode, reason: String },
    #[error("storage operation failed: {0}")]
    Storage(
        #[from]
        #[source]
        StorageError,
    ),
}
