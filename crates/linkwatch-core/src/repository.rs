use crate::error::Result;
use crate::record::{ClickCommit, ClickEvent, ClickMetadata, LinkRecord, OwnerId, Versioned};
use crate::shortcode::ShortCode;
use crate::watch::KeyWatch;
use async_trait::async_trait;

/// A read-only view of the link store.
///
/// Services that only resolve or display links (the redirector's lookup
/// path, the live-view notifier) depend on this trait alone.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves a link record together with the version it was read at.
    /// Returns `None` if the code does not exist.
    async fn get_versioned(&self, code: &ShortCode) -> Result<Option<Versioned<LinkRecord>>>;

    /// Retrieves the link record for a given short code.
    async fn get(&self, code: &ShortCode) -> Result<Option<LinkRecord>> {
        Ok(self.get_versioned(code).await?.map(Versioned::into_inner))
    }

    /// Checks whether a short code already exists in the store.
    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.get_versioned(code).await?.is_some())
    }

    /// Lists every stored link. Unordered, unpaginated.
    async fn list_all(&self) -> Result<Vec<LinkRecord>>;

    /// Lists the links created by `owner`.
    ///
    /// Index entries whose link record is not visible are skipped.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<LinkRecord>>;

    /// Retrieves the click event stored at `sequence` for a code.
    async fn get_click_event(&self, code: &ShortCode, sequence: u64) -> Result<Option<ClickEvent>>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new link with zero clicks, together with its owner index
    /// entry when owner indexing is enabled.
    ///
    /// Returns `Err(Conflict)` if the code already exists; the existing
    /// record is left untouched.
    async fn create(
        &self,
        code: &ShortCode,
        long_url: &str,
        owner: Option<&OwnerId>,
    ) -> Result<LinkRecord>;

    /// Replaces the long URL of an existing link, keeping `created_at` and
    /// `click_count`.
    ///
    /// Returns `Err(NotFound)` for an unknown code and `Err(NoOp)` if the URL
    /// is unchanged. The new URL is applied on top of the freshest record, so
    /// clicks committed concurrently are kept.
    async fn update_long_url(&self, code: &ShortCode, new_long_url: &str) -> Result<LinkRecord>;

    /// Commits one click on top of `current`: the click event at sequence
    /// `current.click_count + 1` and the bumped link record, atomically.
    ///
    /// The commit is guarded by `current.version`. If the link changed since
    /// it was read, nothing is written and `Err(Conflict)` is returned; the
    /// caller must re-read before trying again. On success the written event
    /// is returned with the link, so no read-back is needed.
    async fn increment_click(
        &self,
        current: &Versioned<LinkRecord>,
        metadata: ClickMetadata,
    ) -> Result<ClickCommit>;
}

/// Access to the store's native change-watch primitive.
pub trait ChangeFeed: ReadRepository {
    /// Subscribes to commits on the link record for `code`.
    ///
    /// Only commits after the subscription are reported.
    fn watch(&self, code: &ShortCode) -> Result<KeyWatch>;
}
