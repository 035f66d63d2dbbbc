//! Core types and traits for the linkwatch URL shortener.
//!
//! This crate provides the record model, the storage contracts and the
//! change-watch primitive shared by the shortener, redirector and notifier
//! services.

pub mod change;
pub mod error;
pub mod record;
pub mod repository;
pub mod shortcode;
pub mod shortener;
pub mod watch;

pub use change::{ChangeEvent, LiveUpdate};
pub use error::{CoreError, ShortenerError, StorageError};
pub use record::{ClickCommit, ClickEvent, ClickMetadata, LinkRecord, OwnerId, Versioned, Versionstamp};
pub use repository::{ChangeFeed, ReadRepository, Repository};
pub use shortcode::ShortCode;
pub use shortener::{ShortenParams, Shortener};
pub use watch::KeyWatch;
