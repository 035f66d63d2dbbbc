use async_trait::async_trait;
use linkwatch_core::{
    LinkRecord, OwnerId, Repository, ShortCode, ShortenParams, Shortener, ShortenerError,
    StorageError,
};
use linkwatch_generator::Generator;
use std::sync::Arc;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;
use url::Url;

/// Configures a [`ShortenerService`].
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct ShortenerSettings {
    /// How many generated codes to try before giving up on a collision.
    #[builder(default = 3)]
    pub max_attempts: u32,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and a `Generator` to handle:
/// - Short code generation, retried when a code is already taken
/// - URL validation on update
/// - Mapping storage failures onto domain errors
///
/// The generator never consults the store, so collisions are detected by
/// the repository's conditional create and resolved here with a fresh code.
#[derive(Debug, Clone)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    settings: ShortenerSettings,
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: R, generator: G) -> Self {
        Self::with_settings(repository, generator, ShortenerSettings::default())
    }

    pub fn with_settings(repository: R, generator: G, settings: ShortenerSettings) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
            settings,
        }
    }

    /// Checks that the URL parses as an absolute URL.
    fn validate_url(url: &str) -> Result<(), ShortenerError> {
        Url::parse(url)
            .map(|_| ())
            .map_err(|e| ShortenerError::InvalidUrl(format!("{url}: {e}")))
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, params: ShortenParams) -> Result<LinkRecord, ShortenerError> {
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let code = self.generator.generate(&params.long_url)?;

            match self
                .repository
                .create(&code, &params.long_url, params.owner_id.as_ref())
                .await
            {
                Ok(record) => {
                    debug!(code = %code, attempt, "short link created");
                    return Ok(record);
                }
                Err(StorageError::Conflict(_)) => {
                    warn!(code = %code, attempt, max_attempts, "generated short code collided");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ShortenerError::AliasConflict(format!(
            "no free short code after {max_attempts} attempts"
        )))
    }

    async fn resolve(&self, code: &ShortCode) -> Result<Option<LinkRecord>, ShortenerError> {
        Ok(self.repository.get(code).await?)
    }

    async fn list_all(&self) -> Result<Vec<LinkRecord>, ShortenerError> {
        Ok(self.repository.list_all().await?)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<LinkRecord>, ShortenerError> {
        Ok(self.repository.list_by_owner(owner).await?)
    }

    async fn update(
        &self,
        code: &ShortCode,
        new_long_url: &str,
    ) -> Result<LinkRecord, ShortenerError> {
        Self::validate_url(new_long_url)?;

        let record = self
            .repository
            .update_long_url(code, new_long_url)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(message) => ShortenerError::UpdateConflict(message),
                other => other.into(),
            })?;
        debug!(code = %code, "short link retargeted");
        Ok(record)
    }
}
