use std::sync::Arc;
use std::time::Duration;

use crate::error::{RedirectorError, Result};
use linkwatch_core::{ClickEvent, ClickMetadata, Repository, ShortCode, StorageError};
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

/// Bounds how hard [`AnalyticsRecorder`] fights for a contended link.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct RetryPolicy {
    /// Total commit attempts per click, including the first.
    #[builder(default = 5)]
    pub max_attempts: u32,
    /// Pause between a lost race and the next read. Zero retries immediately.
    #[builder(default = Duration::from_millis(1))]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Records clicks as one atomic transaction each.
///
/// Every attempt reads the link, then commits the click event at
/// `click_count + 1` together with the bumped record, guarded by the version
/// it read. A guard failure means another writer got there first; the click
/// is re-read and retried until the policy runs out, at which point
/// [`RedirectorError::ClickConflict`] is returned. A failed commit writes
/// nothing, so retries never duplicate a click.
#[derive(Debug)]
pub struct AnalyticsRecorder<R> {
    repository: Arc<R>,
    policy: RetryPolicy,
}

impl<R> Clone for AnalyticsRecorder<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            policy: self.policy,
        }
    }
}

impl<R: Repository> AnalyticsRecorder<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_policy(repository, RetryPolicy::default())
    }

    pub fn with_policy(repository: Arc<R>, policy: RetryPolicy) -> Self {
        Self { repository, policy }
    }

    /// Records one click on `code` and returns the stored event.
    pub async fn record_click(
        &self,
        code: &ShortCode,
        metadata: ClickMetadata,
    ) -> Result<ClickEvent> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let Some(current) = self.repository.get_versioned(code).await? else {
                return Err(RedirectorError::NotFound(code.clone()));
            };

            match self
                .repository
                .increment_click(&current, metadata.clone())
                .await
            {
                Ok(commit) => {
                    debug!(
                        code = %code,
                        sequence = commit.event.sequence,
                        attempt,
                        version = %commit.link.version,
                        "click recorded"
                    );
                    return Ok(commit.event);
                }
                Err(StorageError::Conflict(_)) => {
                    trace!(code = %code, attempt, max_attempts, "click conflicted, retrying");
                    if attempt < max_attempts && !self.policy.backoff.is_zero() {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(code = %code, attempts = max_attempts, "giving up on click after repeated conflicts");
        Err(RedirectorError::ClickConflict {
            code: code.clone(),
            attempts: max_attempts,
        })
    }
}
