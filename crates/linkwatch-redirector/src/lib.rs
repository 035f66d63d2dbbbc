//! Redirector service library with click analytics.
//!
//! This crate provides a [`RedirectorService`] that resolves short codes to
//! their target URLs and records every redirect as a click through the
//! [`AnalyticsRecorder`].
//!
//! # Example
//!
//! ```rust
//! use linkwatch_core::{ClickMetadata, Repository, ShortCode};
//! use linkwatch_redirector::RedirectorService;
//! use linkwatch_storage::KvLinkStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = KvLinkStore::new();
//! let code = ShortCode::new("abc123")?;
//! store.create(&code, "https://example.com", None).await?;
//!
//! let service = RedirectorService::new(store);
//! if let Some(redirect) = service.redirect(&code, ClickMetadata::default()).await? {
//!     println!("Redirect to: {} (click #{})", redirect.long_url, redirect.sequence);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod error;
pub mod redirector;
pub mod service;

pub use analytics::{AnalyticsRecorder, RetryPolicy};
pub use error::{RedirectorError, Result};
pub use redirector::{Redirect, Redirector};
pub use service::RedirectorService;
