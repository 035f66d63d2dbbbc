use crate::record::{LinkRecord, OwnerId};
use crate::shortcode::ShortCode;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Parameters for creating a shortened URL.
#[derive(Debug, Clone)]
pub struct ShortenParams {
    /// The URL to be shortened.
    pub long_url: String,
    /// The creating principal. Ignored unless owner indexing is enabled.
    pub owner_id: Option<OwnerId>,
}

impl ShortenParams {
    pub fn new(long_url: impl Into<String>) -> Self {
        Self {
            long_url: long_url.into(),
            owner_id: None,
        }
    }

    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner_id = Some(owner);
        self
    }
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates a shortened URL and returns the stored record.
    async fn shorten(&self, params: ShortenParams) -> Result<LinkRecord>;

    /// Resolves a short code to its stored record.
    /// Returns `None` if the code does not exist.
    async fn resolve(&self, code: &ShortCode) -> Result<Option<LinkRecord>>;

    /// Lists every link.
    async fn list_all(&self) -> Result<Vec<LinkRecord>>;

    /// Lists the links created by `owner`.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<LinkRecord>>;

    /// Points an existing short code at a new URL.
    async fn update(&self, code: &ShortCode, new_long_url: &str) -> Result<LinkRecord>;
}
