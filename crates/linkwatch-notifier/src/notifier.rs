use std::sync::Arc;

use crate::error::{NotifierError, Result};
use crate::subscription::LinkWatch;
use linkwatch_core::{ChangeFeed, ShortCode};
use tracing::debug;

/// Opens live subscriptions to links on top of the store's change feed.
#[derive(Debug)]
pub struct ChangeNotifier<R> {
    feed: Arc<R>,
}

impl<R> Clone for ChangeNotifier<R> {
    fn clone(&self) -> Self {
        Self {
            feed: Arc::clone(&self.feed),
        }
    }
}

impl<R: ChangeFeed> ChangeNotifier<R> {
    pub fn new(feed: Arc<R>) -> Self {
        Self { feed }
    }

    /// Subscribes to changes of `code`.
    ///
    /// Nothing is emitted for the current state; the first event follows the
    /// first commit after this call. Fails with [`NotifierError::NotFound`]
    /// when the link does not exist.
    pub async fn watch(&self, code: &ShortCode) -> Result<LinkWatch<R>> {
        // Subscribe before the existence check so no commit in between is missed.
        let key_watch = self.feed.watch(code)?;

        if !self.feed.exists(code).await? {
            return Err(NotifierError::NotFound(code.clone()));
        }

        debug!(code = %code, key = key_watch.key(), "live view opened");
        Ok(LinkWatch::new(code.clone(), Arc::clone(&self.feed), key_watch))
    }
}
