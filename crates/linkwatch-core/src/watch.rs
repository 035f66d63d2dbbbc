use crate::error::{Result, StorageError};
use crate::record::Versionstamp;
use std::fmt;
use tokio::sync::watch;

/// A subscription to the commit version of a single stored key.
///
/// Each commit touching the key publishes its [`Versionstamp`]. Commits that
/// land between two calls to [`KeyWatch::changed`] are coalesced, so a slow
/// consumer observes only the latest version.
///
/// The subscription holds a slot in the store's watcher registry until it is
/// released, either explicitly or on drop.
pub struct KeyWatch {
    key: String,
    receiver: Option<watch::Receiver<Versionstamp>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl KeyWatch {
    /// Wraps a store-side receiver. `release` runs exactly once, after the
    /// receiver has been dropped.
    pub fn new(
        key: impl Into<String>,
        receiver: watch::Receiver<Versionstamp>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            receiver: Some(receiver),
            release: Some(Box::new(release)),
        }
    }

    /// The watched key, rendered for diagnostics.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits for the next commit on the key and returns its version.
    ///
    /// Fails with [`StorageError::Unavailable`] once the store side of the
    /// channel is gone or the watch has been released.
    pub async fn changed(&mut self) -> Result<Versionstamp> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Err(StorageError::Unavailable(format!(
                "watch on {} was released",
                self.key
            )));
        };

        receiver.changed().await.map_err(|_| {
            StorageError::Unavailable(format!("watch channel for {} closed", self.key))
        })?;

        Ok(*receiver.borrow_and_update())
    }

    pub fn is_released(&self) -> bool {
        self.receiver.is_none()
    }

    /// Returns the registry slot to the store. Idempotent.
    pub fn release(&mut self) {
        // Drop the receiver first so the store sees an accurate receiver count.
        drop(self.receiver.take());
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for KeyWatch {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for KeyWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyWatch")
            .field("key", &self.key)
            .field("released", &self.is_released())
            .finish()
    }
}
