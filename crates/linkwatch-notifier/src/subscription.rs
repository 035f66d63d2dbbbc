use std::sync::Arc;

use crate::error::{NotifierError, Result};
use futures_util::stream::{self, Stream};
use linkwatch_core::{ChangeEvent, ChangeFeed, KeyWatch, ShortCode, Versionstamp};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// Signals a [`LinkWatch`] to stop, from any task.
///
/// Cancelling is idempotent. The watch observes it on its next iteration,
/// including while it is parked waiting for a commit.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A live subscription to one link.
///
/// Each commit on the link wakes the watch, which re-reads the record (and
/// its latest click, when it has one) and yields a [`ChangeEvent`]. Commits
/// that land while the consumer is busy are coalesced into the next event,
/// and events never go backwards in version.
///
/// The subscription ends, releasing its slot in the store's watcher
/// registry, when it is cancelled, when it is dropped, or after the
/// underlying channel fails. A channel failure is reported once as
/// [`NotifierError::ChannelClosed`]; after that, and after cancellation,
/// [`LinkWatch::next`] returns `None`.
#[derive(Debug)]
pub struct LinkWatch<R> {
    code: ShortCode,
    feed: Arc<R>,
    key_watch: KeyWatch,
    cancel: CancelHandle,
    cancelled: watch::Receiver<bool>,
    last_delivered: Versionstamp,
    closed: bool,
}

impl<R: ChangeFeed> LinkWatch<R> {
    pub(crate) fn new(code: ShortCode, feed: Arc<R>, key_watch: KeyWatch) -> Self {
        let (cancel, cancelled) = CancelHandle::new();
        Self {
            code,
            feed,
            key_watch,
            cancel,
            cancelled,
            last_delivered: Versionstamp::ZERO,
            closed: false,
        }
    }

    pub fn code(&self) -> &ShortCode {
        &self.code
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Cancels the subscription and releases the underlying channel now.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.close("cancelled");
    }

    /// Waits for the next change to the link.
    pub async fn next(&mut self) -> Option<Result<ChangeEvent>> {
        loop {
            if self.closed {
                return None;
            }
            if *self.cancelled.borrow() {
                self.close("cancelled");
                return None;
            }

            let changed = tokio::select! {
                biased;
                signal = self.cancelled.changed() => {
                    if signal.is_err() {
                        self.close("cancel handle dropped");
                        return None;
                    }
                    continue;
                }
                changed = self.key_watch.changed() => changed,
            };

            let version = match changed {
                Ok(version) => version,
                Err(e) => {
                    warn!(code = %self.code, error = %e, "watch channel failed");
                    self.close("channel failed");
                    return Some(Err(NotifierError::ChannelClosed {
                        code: self.code.clone(),
                        reason: e.to_string(),
                    }));
                }
            };

            trace!(code = %self.code, version = %version, "link changed");
            match self.deliver().await {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Turns the subscription into a [`Stream`] of change events.
    pub fn into_stream(self) -> impl Stream<Item = Result<ChangeEvent>> + Send {
        stream::unfold(self, |mut watch| async move {
            let item = watch.next().await?;
            Some((item, watch))
        })
    }

    async fn deliver(&mut self) -> Result<Option<ChangeEvent>> {
        let Some(current) = self.feed.get_versioned(&self.code).await? else {
            trace!(code = %self.code, "link not visible, skipping");
            return Ok(None);
        };

        if current.version <= self.last_delivered {
            trace!(code = %self.code, version = %current.version, "state already delivered");
            return Ok(None);
        }

        let clicks = current.value.click_count;
        let latest_click = if clicks > 0 {
            match self.feed.get_click_event(&self.code, clicks).await {
                Ok(event) => event,
                Err(e) => {
                    warn!(code = %self.code, sequence = clicks, error = %e, "cannot read latest click");
                    None
                }
            }
        } else {
            None
        };

        self.last_delivered = current.version;
        debug!(code = %self.code, version = %current.version, clicks, "delivering change");

        Ok(Some(ChangeEvent {
            version: current.version,
            link: current.value,
            latest_click,
        }))
    }

    fn close(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.key_watch.release();
        debug!(code = %self.code, reason, "live view closed");
    }
}
