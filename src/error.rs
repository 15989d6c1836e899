//! Error types for the download flow.
//!
//! Every failure message is self-describing: timeouts carry the configured
//! budget, filter mismatches carry the filter description and the path of the
//! file that actually arrived.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::channel::ChannelError;
use crate::driver::ActionError;
use crate::session::SessionFailure;

/// Errors that can occur while waiting for and archiving a browser download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The browser has no remote-debugging support.
    #[error(
        "The browser you selected \"{browser}\" doesn't have Chrome Devtools protocol functionality."
    )]
    UnsupportedCapability {
        /// Name of the browser.
        browser: String,
    },

    /// The browser canceled the download before receiving any data.
    #[error("Failed to download file. Received 0 bytes.")]
    CanceledZeroBytes,

    /// The browser canceled the download after a partial transfer.
    #[error("File download is canceled after receiving {received_bytes} bytes")]
    CanceledPartial {
        /// Bytes received before cancellation.
        received_bytes: u64,
    },

    /// No terminal signal arrived before the deadline.
    #[error("Failed to download file in {} ms", .timeout.as_millis())]
    Timeout {
        /// Configured wait budget.
        timeout: Duration,
    },

    /// A file arrived but the caller's filter rejected it.
    #[error(
        "Failed to download file in {} ms.{description};\n actually downloaded: {}",
        .timeout.as_millis(),
        .path.display()
    )]
    FilterMismatch {
        /// Configured wait budget.
        timeout: Duration,
        /// Filter description, empty or starting with a space.
        description: String,
        /// Absolute path of the file that was downloaded.
        path: PathBuf,
    },

    /// The control channel went away before the download finished.
    #[error("Failed to download file. Browser control channel was lost.")]
    ChannelLost,

    /// The browser reported completion without announcing a file name.
    #[error("Failed to download file. Browser completed a download without announcing its file name.")]
    MissingFileName,

    /// The announced file name is not a plain file name.
    #[error("Failed to download file. Browser suggested an unsafe file name: {name}")]
    UnsafeFileName {
        /// Name as suggested by the browser.
        name: String,
    },

    /// Configuring the browser failed.
    #[error("control channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Moving the file into its archive folder failed.
    #[error("failed to archive {path}: {source}")]
    Archive {
        /// Path being created or moved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The caller's action failed. Carries the action's own error untouched.
    #[error("{0}")]
    Action(ActionError),
}

impl DownloadError {
    /// Creates an unsupported-capability error.
    pub fn unsupported(browser: impl Into<String>) -> Self {
        Self::UnsupportedCapability {
            browser: browser.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Creates a filter mismatch error.
    pub fn filter_mismatch(
        timeout: Duration,
        description: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::FilterMismatch {
            timeout,
            description: description.into(),
            path: path.into(),
        }
    }

    /// Creates an archive IO error.
    pub fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a "file was not downloaded" failure, as opposed to a
    /// setup, IO or caller error.
    #[must_use]
    pub fn is_download_failure(&self) -> bool {
        matches!(
            self,
            Self::CanceledZeroBytes
                | Self::CanceledPartial { .. }
                | Self::Timeout { .. }
                | Self::FilterMismatch { .. }
                | Self::ChannelLost
                | Self::MissingFileName
                | Self::UnsafeFileName { .. }
        )
    }

    /// Hint for callers deciding whether to trigger the download again.
    ///
    /// Nothing in this crate retries on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ChannelLost)
    }
}

impl From<SessionFailure> for DownloadError {
    fn from(failure: SessionFailure) -> Self {
        match failure {
            SessionFailure::CanceledZeroBytes => Self::CanceledZeroBytes,
            SessionFailure::CanceledPartial { received_bytes } => {
                Self::CanceledPartial { received_bytes }
            }
            SessionFailure::ChannelLost => Self::ChannelLost,
        }
    }
}
