//! Bridge from the browser's asynchronous event feed into a [`DownloadSession`].
//!
//! [`EventSubscription::arm`] subscribes to the control channel, enables page
//! notifications and switches the browser to auto-save downloads into the
//! download folder. Only after all of that has succeeded does it return, so the
//! caller's action can never start a download the listener would miss.
//!
//! A pump task then applies every download event to the session. Failures are
//! recorded as terminal state on the session rather than raised from the task:
//! the waiting side is the only place an error can be propagated to.

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::channel::{
    Command, ControlChannel, DownloadBehavior, DownloadEvent, DownloadProgress, DownloadState,
    EventStream, RawEvent,
};
use crate::error::DownloadError;
use crate::session::{DownloadSession, SessionFailure};

/// Live subscription feeding one [`DownloadSession`].
///
/// Dropping the subscription stops the pump task.
#[derive(Debug)]
pub struct EventSubscription {
    pump: JoinHandle<()>,
}

impl EventSubscription {
    /// Arms the download listeners on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Channel`] if the browser rejects a setup command.
    #[instrument(level = "debug", skip_all, fields(folder = %downloads_folder.display()))]
    pub async fn arm(
        channel: &dyn ControlChannel,
        session: Arc<DownloadSession>,
        downloads_folder: &Path,
    ) -> Result<Self, DownloadError> {
        // Subscribe before configuring, so no event emitted after setup is lost.
        let events = channel.events();

        channel.send(Command::page_enable()).await?;
        let behavior = DownloadBehavior::allow_into(downloads_folder);
        channel
            .send(Command::set_download_behavior(&behavior)?)
            .await?;
        debug!("download behavior configured");

        let pump = tokio::spawn(pump_events(events, session));
        Ok(Self { pump })
    }

    /// Whether the pump task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.pump.is_finished()
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_events(mut events: EventStream, session: Arc<DownloadSession>) {
    while let Some(event) = events.next().await {
        apply_event(&session, &event);
        if session.is_terminal() {
            return;
        }
    }

    if !session.is_terminal() {
        warn!("control channel event stream ended before the download finished");
        session.fail(SessionFailure::ChannelLost);
    }
}

/// Applies a single raw event to the session.
///
/// Unrelated events are ignored; malformed download events are logged and skipped.
pub fn apply_event(session: &DownloadSession, event: &RawEvent) {
    match DownloadEvent::from_raw(event) {
        Ok(Some(DownloadEvent::WillBegin(begin))) => {
            debug!(
                guid = %begin.guid,
                file = %begin.suggested_filename,
                url = %begin.url,
                "download will begin"
            );
            session.record_start(begin.guid, begin.suggested_filename);
        }
        Ok(Some(DownloadEvent::Progress(progress))) => apply_progress(session, &progress),
        Ok(None) => {}
        Err(error) => warn!(error = %error, "skipping malformed download event"),
    }
}

fn apply_progress(session: &DownloadSession, progress: &DownloadProgress) {
    if let Some(guid) = session.guid()
        && guid != progress.guid
    {
        debug!(expected = %guid, got = %progress.guid, "ignoring progress of another download");
        return;
    }

    match progress.state {
        DownloadState::Canceled => {
            let received_bytes = progress.received();
            let failure = if received_bytes == 0 {
                SessionFailure::CanceledZeroBytes
            } else {
                SessionFailure::CanceledPartial { received_bytes }
            };
            warn!(guid = %progress.guid, received_bytes, "download canceled by browser");
            session.fail(failure);
        }
        DownloadState::Completed => {
            if session.mark_completed() {
                debug!(guid = %progress.guid, bytes = progress.received(), "download completed");
            }
        }
        DownloadState::InProgress => {
            debug!(
                guid = %progress.guid,
                received = progress.received(),
                total = progress.total(),
                "download is in progress"
            );
        }
    }
}
