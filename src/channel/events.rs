//! Download-related protocol messages.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ChannelError, RawEvent};

const DOWNLOAD_WILL_BEGIN: &str = "Browser.downloadWillBegin";
const DOWNLOAD_PROGRESS: &str = "Browser.downloadProgress";

/// What the browser should do when a download starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Behavior {
    /// Reject downloads.
    Deny,
    /// Save under the suggested file name.
    Allow,
    /// Save under the download guid.
    AllowAndName,
    /// Browser default (usually a save dialog).
    Default,
}

/// Parameters of `Browser.setDownloadBehavior`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadBehavior {
    /// Download policy.
    pub behavior: Behavior,
    /// Restrict the policy to one browser context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_context_id: Option<String>,
    /// Folder downloads are saved into, required for `allow` and `allowAndName`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_path: Option<PathBuf>,
    /// Emit `downloadWillBegin` / `downloadProgress` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_enabled: Option<bool>,
}

impl DownloadBehavior {
    /// Auto-accept every download into `folder` and report progress events.
    #[must_use]
    pub fn allow_into(folder: &Path) -> Self {
        Self {
            behavior: Behavior::Allow,
            browser_context_id: None,
            download_path: Some(folder.to_path_buf()),
            events_enabled: Some(true),
        }
    }
}

/// `Browser.downloadWillBegin` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadWillBegin {
    /// Frame that started the download.
    #[serde(default)]
    pub frame_id: Option<String>,
    /// Download identifier, shared with the progress events.
    pub guid: String,
    /// URL being downloaded.
    #[serde(default)]
    pub url: String,
    /// File name the browser will save under.
    pub suggested_filename: String,
}

/// Lifecycle state carried by `Browser.downloadProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadState {
    InProgress,
    Completed,
    Canceled,
}

/// `Browser.downloadProgress` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    /// Download identifier.
    pub guid: String,
    /// Expected size, zero when unknown.
    #[serde(default)]
    pub total_bytes: f64,
    /// Bytes written so far.
    pub received_bytes: f64,
    /// Current state.
    pub state: DownloadState,
}

impl DownloadProgress {
    /// Received byte count as an integer. The protocol sends doubles.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn received(&self) -> u64 {
        self.received_bytes.max(0.0) as u64
    }

    /// Expected total as an integer, zero when unknown.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn total(&self) -> u64 {
        self.total_bytes.max(0.0) as u64
    }
}

/// Typed download event.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    WillBegin(DownloadWillBegin),
    Progress(DownloadProgress),
}

impl DownloadEvent {
    /// Decodes a raw event.
    ///
    /// Returns `Ok(None)` for methods unrelated to downloads.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Malformed`] when a download event has an unexpected shape.
    pub fn from_raw(event: &RawEvent) -> Result<Option<Self>, ChannelError> {
        match event.method.as_str() {
            DOWNLOAD_WILL_BEGIN => serde_json::from_value(event.params.clone())
                .map(|payload| Some(Self::WillBegin(payload)))
                .map_err(|e| ChannelError::malformed(DOWNLOAD_WILL_BEGIN, e)),
            DOWNLOAD_PROGRESS => serde_json::from_value(event.params.clone())
                .map(|payload| Some(Self::Progress(payload)))
                .map_err(|e| ChannelError::malformed(DOWNLOAD_PROGRESS, e)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_download_will_begin() {
        let raw = RawEvent::new(
            "Browser.downloadWillBegin",
            json!({
                "frameId": "F1",
                "guid": "0b7c",
                "url": "https://example.com/report.pdf",
                "suggestedFilename": "report.pdf"
            }),
        );

        let event = DownloadEvent::from_raw(&raw).unwrap().unwrap();
        let DownloadEvent::WillBegin(begin) = event else {
            panic!("expected will-begin, got {event:?}");
        };
        assert_eq!(begin.guid, "0b7c");
        assert_eq!(begin.suggested_filename, "report.pdf");
        assert_eq!(begin.frame_id.as_deref(), Some("F1"));
    }

    #[test]
    fn test_decode_download_progress_states() {
        for (state, expected) in [
            ("inProgress", DownloadState::InProgress),
            ("completed", DownloadState::Completed),
            ("canceled", DownloadState::Canceled),
        ] {
            let raw = RawEvent::new(
                "Browser.downloadProgress",
                json!({"guid": "g", "totalBytes": 10.0, "receivedBytes": 4.0, "state": state}),
            );
            let Some(DownloadEvent::Progress(progress)) = DownloadEvent::from_raw(&raw).unwrap()
            else {
                panic!("expected progress event for {state}");
            };
            assert_eq!(progress.state, expected);
            assert_eq!(progress.received(), 4);
            assert_eq!(progress.total(), 10);
        }
    }

    #[test]
    fn test_unrelated_event_is_ignored() {
        let raw = RawEvent::new("Page.loadEventFired", json!({"timestamp": 1.0}));
        assert_eq!(DownloadEvent::from_raw(&raw).unwrap(), None);
    }

    #[test]
    fn test_malformed_progress_is_an_error() {
        let raw = RawEvent::new(
            "Browser.downloadProgress",
            json!({"guid": "g", "state": "exploded"}),
        );
        let error = DownloadEvent::from_raw(&raw).unwrap_err();
        assert!(matches!(error, ChannelError::Malformed { .. }));
        assert!(error.to_string().contains("Browser.downloadProgress"));
    }

    #[test]
    fn test_allow_into_serializes_only_set_fields() {
        let behavior = DownloadBehavior {
            browser_context_id: Some("ctx".to_string()),
            ..DownloadBehavior::allow_into(Path::new("/dl"))
        };
        let value = serde_json::to_value(&behavior).unwrap();
        assert_eq!(
            value,
            json!({
                "behavior": "allow",
                "browserContextId": "ctx",
                "downloadPath": "/dl",
                "eventsEnabled": true
            })
        );
    }
}
