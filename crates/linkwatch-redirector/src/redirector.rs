use crate::error::Result;
use async_trait::async_trait;
use linkwatch_core::{ClickMetadata, LinkRecord, ShortCode};

/// Where a redirect should send the client, and which click it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub long_url: String,
    /// Sequence number of the click recorded for this redirect.
    pub sequence: u64,
}

#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a short code to its stored link record without counting a click.
    /// Returns `None` if the code does not exist.
    async fn resolve(&self, code: &ShortCode) -> Result<Option<LinkRecord>>;

    /// Resolves a short code and records the click.
    /// Returns `None` if the code does not exist.
    async fn redirect(&self, code: &ShortCode, metadata: ClickMetadata)
        -> Result<Option<Redirect>>;
}
