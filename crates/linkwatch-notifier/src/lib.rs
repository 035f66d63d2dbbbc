//! Live change notifications for links.
//!
//! A [`ChangeNotifier`] turns the store's per-key change feed into a
//! cancellable [`LinkWatch`]: one [`ChangeEvent`](linkwatch_core::ChangeEvent)
//! per observed commit, coalesced to the latest state and ordered by commit.
//!
//! ```rust
//! use std::sync::Arc;
//! use linkwatch_core::ShortCode;
//! use linkwatch_notifier::ChangeNotifier;
//! use linkwatch_storage::KvLinkStore;
//!
//! # async fn example(store: Arc<KvLinkStore>) -> Result<(), Box<dyn std::error::Error>> {
//! let notifier = ChangeNotifier::new(store);
//! let mut watch = notifier.watch(&ShortCode::new("abc123")?).await?;
//!
//! while let Some(event) = watch.next().await {
//!     let frame = event?.to_live_update().to_sse_frame()?;
//!     print!("{frame}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod notifier;
pub mod subscription;

pub use error::{NotifierError, Result};
pub use notifier::ChangeNotifier;
pub use subscription::{CancelHandle, LinkWatch};
