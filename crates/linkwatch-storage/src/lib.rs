//! Storage backends for linkwatch.
//!
//! [`KvStore`] is an ordered, versioned key-value engine with check-and-set
//! transactions and per-key watch channels. [`KvLinkStore`] lays the link,
//! click and owner-index records out on top of it.

pub mod keys;
pub mod kv;
pub mod link_store;

pub use kv::{AtomicOperation, CommitResult, Entry, Key, KeyPart, KvStore};
pub use link_store::{KvLinkStore, StoreSettings, Tenancy};
pub use linkwatch_core::error::{Result, StorageError};
pub use linkwatch_core::{ChangeFeed, ReadRepository, Repository};
