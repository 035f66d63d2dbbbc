use crate::record::{ClickEvent, LinkRecord, Versionstamp};
use serde::Serialize;

/// One delivery of the live view: the link as re-read after a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Version the link was read at for this delivery.
    pub version: Versionstamp,
    pub link: LinkRecord,
    /// The click at `link.click_count`, when there is one and it could be read.
    pub latest_click: Option<ClickEvent>,
}

impl ChangeEvent {
    pub fn click_count(&self) -> u64 {
        self.link.click_count
    }

    /// Projects the event onto the payload pushed to live viewers.
    pub fn to_live_update(&self) -> LiveUpdate {
        LiveUpdate {
            click_count: self.link.click_count,
            click_analytics: self.latest_click.clone(),
        }
    }
}

/// The JSON object sent to a live viewer for each change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveUpdate {
    pub click_count: u64,
    pub click_analytics: Option<ClickEvent>,
}

impl LiveUpdate {
    /// Renders the update as one server-sent-events frame.
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
