use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier of the principal that created a link.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored short link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Primary key, immutable once created.
    pub short_code: ShortCode,
    /// The URL the short code redirects to.
    pub long_url: String,
    /// When the link was created. Never rewritten.
    pub created_at: Timestamp,
    /// The creating principal, present only when owner indexing is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<OwnerId>,
    /// Number of committed click events for this code.
    pub click_count: u64,
    /// Sequence number of the most recent click event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_click_event: Option<u64>,
}

impl LinkRecord {
    /// Builds a fresh record with no clicks.
    pub fn new(
        short_code: ShortCode,
        long_url: impl Into<String>,
        owner_id: Option<OwnerId>,
    ) -> Self {
        Self {
            short_code,
            long_url: long_url.into(),
            created_at: Timestamp::now(),
            owner_id,
            click_count: 0,
            last_click_event: None,
        }
    }
}

/// Request-derived metadata attached to a click. Best effort, never validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// One redirect traversal. Written once, together with the counter bump that
/// produced its sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub short_code: ShortCode,
    /// Equals the link's `click_count` after this click committed.
    pub sequence: u64,
    pub occurred_at: Timestamp,
    #[serde(flatten)]
    pub metadata: ClickMetadata,
}

/// Monotonic commit version assigned by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Versionstamp(u64);

impl Versionstamp {
    pub const ZERO: Versionstamp = Versionstamp(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Versionstamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:020}", self.0)
    }
}

/// A value together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Versionstamp,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: Versionstamp) -> Self {
        Self { value, version }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// A committed click: the bumped link at its new version and the event
/// written in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickCommit {
    pub link: Versioned<LinkRecord>,
    pub event: ClickEvent,
}
