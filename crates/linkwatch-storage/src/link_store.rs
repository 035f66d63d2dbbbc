use crate::keys;
use crate::kv::{CommitResult, Entry, Key, KvStore};
use async_trait::async_trait;
use jiff::Timestamp;
use linkwatch_core::error::{Result, StorageError};
use linkwatch_core::{
    ChangeFeed, ClickCommit, ClickEvent, ClickMetadata, KeyWatch, LinkRecord, OwnerId,
    ReadRepository, Repository, ShortCode, Versioned,
};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

/// Whether links are attributed to owners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tenancy {
    /// Public links. Owner ids passed to `create` are discarded and
    /// `list_by_owner` is unsupported.
    #[default]
    Single,
    /// Links carry an owner id and an owner index is maintained in the same
    /// transaction as the link record.
    Multi,
}

/// Configures a [`KvLinkStore`].
#[derive(Debug, Clone, Copy, Default, TypedBuilder)]
pub struct StoreSettings {
    #[builder(default)]
    pub tenancy: Tenancy,
}

/// The link store, laid out over a [`KvStore`] using the key schema in
/// [`crate::keys`].
///
/// Every multi-key write is one [`KvStore::atomic`] commit. Click
/// increments are guarded by the link record's version, so concurrent
/// redirects of the same link cannot both commit on the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct KvLinkStore {
    kv: KvStore,
    settings: StoreSettings,
}

/// Upper bound on re-reads when a URL update races click commits.
const UPDATE_ATTEMPTS: usize = 16;

impl KvLinkStore {
    /// Creates a single-tenant store over a fresh key space.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: StoreSettings) -> Self {
        Self {
            kv: KvStore::new(),
            settings,
        }
    }

    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    /// Number of live watches on the link record for `code`.
    pub fn active_watchers(&self, code: &ShortCode) -> usize {
        self.kv.watcher_count(&keys::link(code))
    }

    /// Terminates every open watch. See [`KvStore::close_watches`].
    pub fn close_watches(&self) {
        self.kv.close_watches();
    }

    /// Lists the click events of a link in sequence order.
    pub fn list_click_events(&self, code: &ShortCode) -> Result<Vec<ClickEvent>> {
        self.kv
            .list(&keys::clicks(code))
            .into_iter()
            .map(|(key, entry)| decode(&key, entry))
            .collect()
    }
}

fn decode<T: DeserializeOwned>(key: &Key, entry: Entry) -> Result<T> {
    serde_json::from_value(entry.value)
        .map_err(|e| StorageError::InvalidData(format!("cannot decode {key}: {e}")))
}

#[async_trait]
impl ReadRepository for KvLinkStore {
    async fn get_versioned(&self, code: &ShortCode) -> Result<Option<Versioned<LinkRecord>>> {
        let key = keys::link(code);

        let Some(entry) = self.kv.get(&key) else {
            trace!(code = %code, "link not found");
            return Ok(None);
        };

        let version = entry.version;
        Ok(Some(Versioned::new(decode(&key, entry)?, version)))
    }

    async fn list_all(&self) -> Result<Vec<LinkRecord>> {
        self.kv
            .list(&keys::links())
            .into_iter()
            .map(|(key, entry)| decode(&key, entry))
            .collect()
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<LinkRecord>> {
        if self.settings.tenancy != Tenancy::Multi {
            return Err(StorageError::Unsupported(
                "owner index is disabled for single-tenant stores".to_string(),
            ));
        }

        let codes = self
            .kv
            .list(&keys::owned_by(owner))
            .into_iter()
            .map(|(key, entry)| decode::<ShortCode>(&key, entry))
            .collect::<Result<Vec<_>>>()?;

        let link_keys: Vec<Key> = codes.iter().map(keys::link).collect();
        let mut links = Vec::with_capacity(link_keys.len());

        for (key, entry) in link_keys.iter().zip(self.kv.get_many(&link_keys)) {
            match entry {
                Some(entry) => links.push(decode(key, entry)?),
                // The index entry is visible but the record is not: skip it.
                None => trace!(owner = %owner, key = %key, "owner index entry without link"),
            }
        }

        Ok(links)
    }

    async fn get_click_event(&self, code: &ShortCode, sequence: u64) -> Result<Option<ClickEvent>> {
        let key = keys::click(code, sequence);
        self.kv
            .get(&key)
            .map(|entry| decode(&key, entry))
            .transpose()
    }
}

#[async_trait]
impl Repository for KvLinkStore {
    async fn create(
        &self,
        code: &ShortCode,
        long_url: &str,
        owner: Option<&OwnerId>,
    ) -> Result<LinkRecord> {
        let owner = match self.settings.tenancy {
            Tenancy::Multi => owner.cloned(),
            Tenancy::Single => {
                if let Some(owner) = owner {
                    trace!(code = %code, owner = %owner, "single-tenant store, dropping owner");
                }
                None
            }
        };

        let record = LinkRecord::new(code.clone(), long_url, owner);
        let key = keys::link(code);

        let mut op = self.kv.atomic().check(key.clone(), None).set(key, &record);
        if let Some(owner) = &record.owner_id {
            op = op.set(keys::owner(owner, code), code);
        }

        match op.commit()? {
            CommitResult::Committed(version) => {
                debug!(code = %code, version = %version, "link created");
                Ok(record)
            }
            CommitResult::CheckFailed => {
                debug!(code = %code, "short code already taken");
                Err(StorageError::Conflict(code.to_string()))
            }
        }
    }

    async fn update_long_url(&self, code: &ShortCode, new_long_url: &str) -> Result<LinkRecord> {
        let key = keys::link(code);

        // The overwrite is applied on top of the freshest record, so a click
        // committed between our read and write is kept rather than reverted.
        for attempt in 1..=UPDATE_ATTEMPTS {
            let Some(current) = self.get_versioned(code).await? else {
                return Err(StorageError::NotFound(code.to_string()));
            };

            if current.value.long_url == new_long_url {
                return Err(StorageError::NoOp(code.to_string()));
            }

            let mut updated = current.value;
            updated.long_url = new_long_url.to_string();

            match self
                .kv
                .atomic()
                .check(key.clone(), Some(current.version))
                .set(key.clone(), &updated)
                .commit()?
            {
                CommitResult::Committed(version) => {
                    debug!(code = %code, version = %version, "long url updated");
                    return Ok(updated);
                }
                CommitResult::CheckFailed => {
                    trace!(code = %code, attempt, "link changed during update, re-reading");
                }
            }
        }

        warn!(code = %code, attempts = UPDATE_ATTEMPTS, "update kept losing to concurrent writes");
        Err(StorageError::Conflict(code.to_string()))
    }

    async fn increment_click(
        &self,
        current: &Versioned<LinkRecord>,
        metadata: ClickMetadata,
    ) -> Result<ClickCommit> {
        let code = &current.value.short_code;
        let sequence = current.value.click_count + 1;
        let link_key = keys::link(code);
        let click_key = keys::click(code, sequence);

        let event = ClickEvent {
            short_code: code.clone(),
            sequence,
            occurred_at: Timestamp::now(),
            metadata,
        };

        let mut next = current.value.clone();
        next.click_count = sequence;
        next.last_click_event = Some(sequence);

        let result = self
            .kv
            .atomic()
            .check(link_key.clone(), Some(current.version))
            .check(click_key.clone(), None)
            .set(link_key, &next)
            .set(click_key, &event)
            .commit()?;

        match result {
            CommitResult::Committed(version) => {
                trace!(code = %code, sequence, version = %version, "click committed");
                Ok(ClickCommit {
                    link: Versioned::new(next, version),
                    event,
                })
            }
            CommitResult::CheckFailed => {
                trace!(code = %code, sequence, read_version = %current.version, "click lost the race");
                Err(StorageError::Conflict(code.to_string()))
            }
        }
    }
}

impl ChangeFeed for KvLinkStore {
    fn watch(&self, code: &ShortCode) -> Result<KeyWatch> {
        self.kv.watch(&keys::link(code))
    }
}
