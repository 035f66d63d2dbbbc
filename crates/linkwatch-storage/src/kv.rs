use dashmap::DashMap;
use linkwatch_core::error::{Result, StorageError};
use linkwatch_core::{KeyWatch, Versionstamp};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, trace};

/// One component of a [`Key`].
///
/// Strings sort before integers; integers sort numerically, so click
/// sequences come back in commit order from a prefix scan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    Str(String),
    U64(u64),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_owned())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        KeyPart::U64(value)
    }
}

impl Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => f.write_str(s),
            KeyPart::U64(n) => write!(f, "{n}"),
        }
    }
}

/// A tuple key. Keys sharing a prefix are contiguous in key order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Vec<KeyPart>);

impl Key {
    pub fn new<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<KeyPart>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn last(&self) -> Option<&KeyPart> {
        self.0.last()
    }

    pub fn starts_with(&self, prefix: &Key) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns a new key with `part` appended.
    pub fn push(&self, part: impl Into<KeyPart>) -> Key {
        let mut parts = self.0.clone();
        parts.push(part.into());
        Key(parts)
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// A stored value and the version of the commit that wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: serde_json::Value,
    pub version: Versionstamp,
}

#[derive(Default)]
struct KvState {
    entries: BTreeMap<Key, Entry>,
    version: Versionstamp,
}

#[derive(Default)]
struct KvInner {
    state: RwLock<KvState>,
    watchers: DashMap<Key, watch::Sender<Versionstamp>>,
    closed: AtomicBool,
}

/// An in-process, ordered key-value store.
///
/// All mutation goes through [`AtomicOperation`]: a set of version checks
/// and writes applied under one write lock, so a commit is all-or-nothing
/// and sees no interleaving writer. Every commit gets a fresh
/// [`Versionstamp`] and publishes it to the watchers of the keys it wrote
/// before the lock is released, so watchers observe versions in commit order.
///
/// Cloning is cheap; clones share the same data.
#[derive(Clone, Default)]
pub struct KvStore {
    inner: Arc<KvInner>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Key) -> Option<Entry> {
        self.inner.state.read().entries.get(key).cloned()
    }

    /// Reads several keys from one consistent snapshot.
    pub fn get_many(&self, keys: &[Key]) -> Vec<Option<Entry>> {
        let state = self.inner.state.read();
        keys.iter().map(|key| state.entries.get(key).cloned()).collect()
    }

    /// Returns every entry whose key starts with `prefix`, in key order.
    pub fn list(&self, prefix: &Key) -> Vec<(Key, Entry)> {
        let state = self.inner.state.read();
        state
            .entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// The version of the most recent commit.
    pub fn current_version(&self) -> Versionstamp {
        self.inner.state.read().version
    }

    /// Starts a new transaction.
    pub fn atomic(&self) -> AtomicOperation<'_> {
        AtomicOperation {
            store: self,
            checks: Vec::new(),
            mutations: Vec::new(),
            encode_error: None,
        }
    }

    /// Subscribes to commits that write `key`.
    ///
    /// Fails with [`StorageError::Unavailable`] after [`KvStore::close_watches`].
    pub fn watch(&self, key: &Key) -> Result<KeyWatch> {
        if self.is_closed() {
            return Err(watches_closed(key));
        }
        self.subscribe(key)
    }

    /// Registers a receiver for `key`. A `close_watches` that ran after the
    /// caller's closed check but before the insert is caught by the re-check,
    /// so no channel outlives the shutdown.
    fn subscribe(&self, key: &Key) -> Result<KeyWatch> {
        // Subscribing while holding the entry guard keeps this atomic with the
        // release path's `remove_if`.
        let receiver = self
            .inner
            .watchers
            .entry(key.clone())
            .or_insert_with(|| watch::channel(Versionstamp::ZERO).0)
            .subscribe();

        let registry: Weak<KvInner> = Arc::downgrade(&self.inner);
        let owned_key = key.clone();
        let mut key_watch = KeyWatch::new(key.to_string(), receiver, move || {
            let Some(inner) = registry.upgrade() else {
                return;
            };
            let removed = inner
                .watchers
                .remove_if(&owned_key, |_, sender| sender.receiver_count() == 0)
                .is_some();
            trace!(key = %owned_key, removed, "watch released");
        });

        if self.is_closed() {
            key_watch.release();
            return Err(watches_closed(key));
        }

        trace!(key = %key, "watch opened");
        Ok(key_watch)
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of live watches on `key`.
    pub fn watcher_count(&self, key: &Key) -> usize {
        self.inner
            .watchers
            .get(key)
            .map_or(0, |sender| sender.receiver_count())
    }

    /// Number of keys with at least one registered watch channel.
    pub fn watched_keys(&self) -> usize {
        self.inner.watchers.len()
    }

    /// Drops every watch channel. Open [`KeyWatch`]es observe a closed
    /// channel and new watches are refused.
    pub fn close_watches(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.watchers.clear();
        debug!("all watch channels closed");
    }
}

fn watches_closed(key: &Key) -> StorageError {
    StorageError::Unavailable(format!("watches are closed, cannot watch {key}"))
}

impl fmt::Debug for KvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("KvStore")
            .field("entries", &state.entries.len())
            .field("version", &state.version)
            .field("watched_keys", &self.inner.watchers.len())
            .finish()
    }
}

/// Outcome of [`AtomicOperation::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    Committed(Versionstamp),
    /// A version check failed; nothing was written.
    CheckFailed,
}

impl CommitResult {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitResult::Committed(_))
    }
}

/// A check-and-set transaction over a [`KvStore`].
#[must_use = "an atomic operation does nothing until committed"]
pub struct AtomicOperation<'a> {
    store: &'a KvStore,
    checks: Vec<(Key, Option<Versionstamp>)>,
    mutations: Vec<(Key, serde_json::Value)>,
    encode_error: Option<StorageError>,
}

impl AtomicOperation<'_> {
    /// Requires `key` to be at `version` when the commit applies.
    /// `None` requires the key to be absent.
    pub fn check(mut self, key: Key, version: Option<Versionstamp>) -> Self {
        self.checks.push((key, version));
        self
    }

    /// Writes `value` to `key`. Encoding failures surface from `commit`.
    pub fn set<T: Serialize + ?Sized>(mut self, key: Key, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => self.mutations.push((key, value)),
            Err(e) => {
                if self.encode_error.is_none() {
                    self.encode_error = Some(StorageError::InvalidData(format!(
                        "cannot encode value for {key}: {e}"
                    )));
                }
            }
        }
        self
    }

    pub fn commit(self) -> Result<CommitResult> {
        if let Some(err) = self.encode_error {
            return Err(err);
        }

        let inner = &self.store.inner;
        let mut state = inner.state.write();

        for (key, expected) in &self.checks {
            let actual = state.entries.get(key).map(|entry| entry.version);
            if actual != *expected {
                trace!(
                    key = %key,
                    expected = ?expected,
                    actual = ?actual,
                    "version check failed"
                );
                return Ok(CommitResult::CheckFailed);
            }
        }

        if self.mutations.is_empty() {
            return Ok(CommitResult::Committed(state.version));
        }

        let version = state.version.next();
        state.version = version;

        for (key, value) in self.mutations {
            if let Some(sender) = inner.watchers.get(&key) {
                sender.send_replace(version);
            }
            state.entries.insert(key, Entry { value, version });
        }

        trace!(version = %version, "commit applied");
        Ok(CommitResult::Committed(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn key(parts: &[&str]) -> Key {
        Key::new(parts.iter().copied())
    }

    #[test]
    fn set_and_get() {
        let kv = KvStore::new();
        let result = kv.atomic().set(key(&["a", "1"]), &json!({"n": 1})).commit().unwrap();

        let CommitResult::Committed(version) = result else {
            panic!("commit should apply");
        };
        let entry = kv.get(&key(&["a", "1"])).unwrap();
        assert_eq!(entry.value, json!({"n": 1}));
        assert_eq!(entry.version, version);
        assert!(kv.get(&key(&["a", "2"])).is_none());
    }

    #[test]
    fn check_absent_rejects_existing_key() {
        let kv = KvStore::new();
        let k = key(&["links", "abc"]);

        let first = kv.atomic().check(k.clone(), None).set(k.clone(), "first").commit();
        assert!(first.unwrap().is_committed());

        let second = kv.atomic().check(k.clone(), None).set(k.clone(), "second").commit();
        assert_eq!(second.unwrap(), CommitResult::CheckFailed);
        assert_eq!(kv.get(&k).unwrap().value, json!("first"));
    }

    #[test]
    fn stale_version_check_writes_nothing() {
        let kv = KvStore::new();
        let k = key(&["counter"]);
        let other = key(&["side-effect"]);

        kv.atomic().set(k.clone(), &1).commit().unwrap();
        let read = kv.get(&k).unwrap();
        kv.atomic().set(k.clone(), &2).commit().unwrap();

        let result = kv
            .atomic()
            .check(k.clone(), Some(read.version))
            .set(k.clone(), &3)
            .set(other.clone(), &true)
            .commit()
            .unwrap();

        assert_eq!(result, CommitResult::CheckFailed);
        assert_eq!(kv.get(&k).unwrap().value, json!(2));
        assert!(kv.get(&other).is_none());
    }

    #[test]
    fn versions_increase_per_commit() {
        let kv = KvStore::new();
        let a = kv.atomic().set(key(&["a"]), &1).set(key(&["b"]), &2).commit().unwrap();
        let b = kv.atomic().set(key(&["a"]), &3).commit().unwrap();

        let (CommitResult::Committed(a), CommitResult::Committed(b)) = (a, b) else {
            panic!("both commits should apply");
        };
        assert!(b > a);
        assert_eq!(kv.get(&key(&["b"])).unwrap().version, a);
        assert_eq!(kv.current_version(), b);
    }

    #[test]
    fn prefix_scan_is_contiguous_and_ordered() {
        let kv = KvStore::new();
        kv.atomic()
            .set(Key::new(["analytics", "abc"]).push(10u64), &10)
            .set(Key::new(["analytics", "abc"]).push(2u64), &2)
            .set(Key::new(["analytics", "abd"]).push(1u64), &1)
            .set(key(&["analytics"]), &0)
            .set(key(&["shortlinks", "abc"]), &"link")
            .commit()
            .unwrap();

        let listed: Vec<_> = kv
            .list(&key(&["analytics", "abc"]))
            .into_iter()
            .map(|(_, entry)| entry.value)
            .collect();

        // numeric parts sort numerically, not lexically
        assert_eq!(listed, vec![json!(2), json!(10)]);
        assert_eq!(kv.list(&key(&["analytics"])).len(), 4);
        assert!(kv.list(&key(&["owners"])).is_empty());
    }

    #[test]
    fn get_many_preserves_order_and_gaps() {
        let kv = KvStore::new();
        kv.atomic().set(key(&["x"]), &1).set(key(&["z"]), &3).commit().unwrap();

        let values: Vec<_> = kv
            .get_many(&[key(&["z"]), key(&["y"]), key(&["x"])])
            .into_iter()
            .map(|entry| entry.map(|e| e.value))
            .collect();
        assert_eq!(values, vec![Some(json!(3)), None, Some(json!(1))]);
    }

    #[test]
    fn key_display() {
        let k = Key::new(["analytics", "abc"]).push(7u64);
        assert_eq!(k.to_string(), "analytics/abc/7");
        assert_eq!(k.last(), Some(&KeyPart::U64(7)));
    }

    #[tokio::test]
    async fn watch_reports_only_later_commits() {
        let kv = KvStore::new();
        let k = key(&["shortlinks", "abc"]);
        kv.atomic().set(k.clone(), &0).commit().unwrap();

        let mut watch = kv.watch(&k).unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(20), watch.changed()).await;
        assert!(pending.is_err(), "no event for the initial state");

        let CommitResult::Committed(version) = kv.atomic().set(k.clone(), &1).commit().unwrap()
        else {
            panic!("commit should apply");
        };
        assert_eq!(watch.changed().await.unwrap(), version);
    }

    #[tokio::test]
    async fn watch_ignores_other_keys_and_failed_commits() {
        let kv = KvStore::new();
        let k = key(&["shortlinks", "abc"]);
        let mut watch = kv.watch(&k).unwrap();

        kv.atomic().set(key(&["shortlinks", "other"]), &1).commit().unwrap();
        kv.atomic()
            .check(key(&["missing"]), Some(Versionstamp::new(99)))
            .set(k.clone(), &1)
            .commit()
            .unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(20), watch.changed()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn dropping_watches_empties_the_registry() {
        let kv = KvStore::new();
        let k = key(&["shortlinks", "abc"]);

        let first = kv.watch(&k).unwrap();
        let second = kv.watch(&k).unwrap();
        assert_eq!(kv.watcher_count(&k), 2);
        assert_eq!(kv.watched_keys(), 1);

        drop(first);
        assert_eq!(kv.watcher_count(&k), 1);
        assert_eq!(kv.watched_keys(), 1);

        drop(second);
        assert_eq!(kv.watcher_count(&k), 0);
        assert_eq!(kv.watched_keys(), 0);
    }

    #[tokio::test]
    async fn close_watches_terminates_open_watches() {
        let kv = KvStore::new();
        let k = key(&["shortlinks", "abc"]);
        let mut watch = kv.watch(&k).unwrap();

        kv.close_watches();

        assert!(matches!(watch.changed().await, Err(StorageError::Unavailable(_))));
        assert!(matches!(kv.watch(&k), Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn subscribe_racing_close_leaves_no_channel() {
        let kv = KvStore::new();
        let k = key(&["shortlinks", "abc"]);

        // close lands after `watch` passed its closed check
        kv.close_watches();
        let result = kv.subscribe(&k);

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(kv.watcher_count(&k), 0);
        assert_eq!(kv.watched_keys(), 0);
    }
}
