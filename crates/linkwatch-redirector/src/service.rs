use std::sync::Arc;

use crate::analytics::{AnalyticsRecorder, RetryPolicy};
use crate::error::RedirectorError;
use crate::redirector::{Redirect, Redirector};
use async_trait::async_trait;
use linkwatch_core::{ClickMetadata, LinkRecord, Repository, ShortCode};
use tracing::{debug, trace};

/// Service for handling URL redirects.
///
/// Looks the link up and records the click through an [`AnalyticsRecorder`]
/// before handing the target URL back to the caller.
#[derive(Debug, Clone)]
pub struct RedirectorService<R> {
    repository: Arc<R>,
    recorder: AnalyticsRecorder<R>,
}

impl<R: Repository> RedirectorService<R> {
    /// Creates a new RedirectorService with the default click retry policy.
    pub fn new(repository: R) -> Self {
        Self::with_policy(repository, RetryPolicy::default())
    }

    pub fn with_policy(repository: R, policy: RetryPolicy) -> Self {
        let repository = Arc::new(repository);
        Self {
            recorder: AnalyticsRecorder::with_policy(Arc::clone(&repository), policy),
            repository,
        }
    }

    /// Resolves a short code, records the click and returns the redirect.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(redirect))` - The target URL and the recorded click sequence
    /// * `Ok(None)` - If the code doesn't exist
    /// * `Err(e)` - If the click could not be committed or storage failed
    pub async fn redirect(
        &self,
        code: &ShortCode,
        metadata: ClickMetadata,
    ) -> crate::Result<Option<Redirect>> {
        Redirector::redirect(self, code, metadata).await
    }
}

#[async_trait]
impl<R: Repository> Redirector for RedirectorService<R> {
    async fn resolve(&self, code: &ShortCode) -> crate::Result<Option<LinkRecord>> {
        trace!(code = %code, "resolving short code");
        Ok(self.repository.get(code).await?)
    }

    async fn redirect(
        &self,
        code: &ShortCode,
        metadata: ClickMetadata,
    ) -> crate::Result<Option<Redirect>> {
        let Some(link) = self.resolve(code).await? else {
            trace!(code = %code, "short code not found");
            return Ok(None);
        };

        match self.recorder.record_click(code, metadata).await {
            Ok(event) => {
                debug!(code = %code, url = %link.long_url, sequence = event.sequence, "redirecting");
                Ok(Some(Redirect {
                    long_url: link.long_url,
                    sequence: event.sequence,
                }))
            }
            Err(RedirectorError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
