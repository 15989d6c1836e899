//! Per-download shared state.
//!
//! A [`DownloadSession`] is created by the coordinator for one download call
//! and shared through `Arc` with the event pump, which mutates it from a
//! different task. Every field is either atomic or behind a short-lived
//! `std::sync::Mutex` that is never held across an `.await`.
//!
//! State only moves forward: `completed` flips to `true` at most once and a
//! recorded failure is never cleared. Each change wakes the waiting side
//! through a [`Notify`], so the wait loop reacts without waiting for the next
//! polling tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use tokio::sync::Notify;
use tokio::sync::futures::Notified;

/// Terminal condition observed on the event side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFailure {
    /// Browser canceled the download with nothing received.
    CanceledZeroBytes,
    /// Browser canceled the download after a partial transfer.
    CanceledPartial {
        /// Bytes received before cancellation.
        received_bytes: u64,
    },
    /// The event stream ended before the download finished.
    ChannelLost,
}

#[derive(Debug, Default)]
struct DownloadIdentity {
    guid: Option<String>,
    suggested_file_name: Option<String>,
}

/// Shared state of one download.
#[derive(Debug, Default)]
pub struct DownloadSession {
    completed: AtomicBool,
    identity: Mutex<DownloadIdentity>,
    failure: OnceLock<SessionFailure>,
    changed: Notify,
}

impl DownloadSession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the browser reported completion.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Terminal failure, if one was recorded.
    #[must_use]
    pub fn failure(&self) -> Option<SessionFailure> {
        self.failure.get().copied()
    }

    /// Whether the session reached completion or failure.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_completed() || self.failure().is_some()
    }

    /// File name announced by the browser.
    #[must_use]
    pub fn suggested_file_name(&self) -> Option<String> {
        self.identity().suggested_file_name.clone()
    }

    /// Download guid announced by the browser.
    #[must_use]
    pub fn guid(&self) -> Option<String> {
        self.identity().guid.clone()
    }

    /// Records the download identity from a will-begin event.
    pub fn record_start(&self, guid: impl Into<String>, suggested_file_name: impl Into<String>) {
        {
            let mut identity = self.identity();
            identity.guid = Some(guid.into());
            identity.suggested_file_name = Some(suggested_file_name.into());
        }
        self.changed.notify_waiters();
    }

    /// Marks the download as completed.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn mark_completed(&self) -> bool {
        let first = !self.completed.swap(true, Ordering::SeqCst);
        if first {
            self.changed.notify_waiters();
        }
        first
    }

    /// Records a terminal failure. The first failure wins.
    ///
    /// Returns `true` if this call recorded the failure.
    pub fn fail(&self, failure: SessionFailure) -> bool {
        let recorded = self.failure.set(failure).is_ok();
        if recorded {
            self.changed.notify_waiters();
        }
        recorded
    }

    /// Future resolving on the next state change.
    ///
    /// Call [`Notified::enable`] on the pinned future before re-checking state
    /// to avoid missing a change that lands in between.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }

    fn identity(&self) -> MutexGuard<'_, DownloadIdentity> {
        self.identity.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
