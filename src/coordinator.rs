//! Orchestration of one browser download, from click to archived file.
//!
//! # Overview
//!
//! [`DownloadCoordinator::download`] runs the whole flow for one file:
//!
//! 1. obtain the browser's `DevTools` channel, failing fast if there is none;
//! 2. create a [`DownloadSession`] and arm the event listeners against it;
//! 3. run the caller's action (usually a click);
//! 4. wait until the session completes, fails, or the deadline passes;
//! 5. resolve the file inside the browser's download folder;
//! 6. check it against the caller's filter;
//! 7. move it into a private archive folder.
//!
//! The browser's download behavior stays configured after the call returns.
//!
//! # Example
//!
//! ```no_run
//! use cdp_download::{Click, DownloadConfig, DownloadCoordinator, filter};
//! # use cdp_download::{BrowserDriver, Clickable};
//! # async fn example(driver: &dyn BrowserDriver, button: &dyn Clickable) -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = DownloadCoordinator::new(DownloadConfig::default());
//! let archived = coordinator
//!     .download(driver, button, std::time::Duration::from_secs(5), &filter::with_extension("pdf"), &Click)
//!     .await?;
//! println!("saved to {}", archived.path().display());
//! # Ok(())
//! # }
//! ```

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::adapter::EventSubscription;
use crate::archive::{ArchivedFile, Archiver};
use crate::channel::ControlChannel;
use crate::config::DownloadConfig;
use crate::deadline::{Deadline, effective_polling_interval};
use crate::driver::{BrowserDriver, Click, Clickable, DownloadAction};
use crate::error::DownloadError;
use crate::filter::{self, DownloadedFile, FileFilter};
use crate::session::{DownloadSession, SessionFailure};

/// Terminal state of the wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The browser reported completion.
    Succeeded,
    /// The browser canceled the download or the channel was lost.
    Failed(SessionFailure),
    /// The deadline passed without a terminal signal.
    TimedOut,
}

/// Runs browser downloads and archives their results.
#[derive(Debug, Clone)]
pub struct DownloadCoordinator {
    config: DownloadConfig,
    archiver: Archiver,
}

impl DownloadCoordinator {
    /// Creates a coordinator archiving below `config.archive_root`.
    #[must_use]
    pub fn new(config: DownloadConfig) -> Self {
        let archiver = Archiver::new(config.archive_root.clone());
        Self { config, archiver }
    }

    /// Creates a coordinator with a custom archiver.
    #[must_use]
    pub fn with_archiver(config: DownloadConfig, archiver: Archiver) -> Self {
        Self { config, archiver }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Clicks `clickable` and downloads with the configured default timeout.
    ///
    /// # Errors
    ///
    /// See [`DownloadCoordinator::download`].
    pub async fn click_to_download<D, E>(
        &self,
        driver: &D,
        clickable: &E,
        filter: &dyn FileFilter,
    ) -> Result<ArchivedFile, DownloadError>
    where
        D: BrowserDriver + ?Sized,
        E: Clickable + ?Sized,
    {
        self.download(driver, clickable, self.config.timeout, filter, &Click)
            .await
    }

    /// Performs `action` and waits up to `timeout` for the resulting download.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::UnsupportedCapability`] if the browser has no `DevTools` channel
    /// - [`DownloadError::Channel`] if the browser rejects the download setup
    /// - [`DownloadError::Action`] with the action's own error
    /// - [`DownloadError::CanceledZeroBytes`] / [`DownloadError::CanceledPartial`]
    ///   if the browser canceled the download
    /// - [`DownloadError::ChannelLost`] if the event stream ended early
    /// - [`DownloadError::Timeout`] if nothing terminal happened in time
    /// - [`DownloadError::MissingFileName`] / [`DownloadError::UnsafeFileName`]
    ///   if the completed download cannot be located
    /// - [`DownloadError::FilterMismatch`] if the file fails `filter`
    /// - [`DownloadError::Archive`] if the file cannot be moved
    #[instrument(
        level = "debug",
        skip_all,
        fields(browser = %driver.browser().name, timeout_ms = timeout.as_millis())
    )]
    pub async fn download<D, E, A>(
        &self,
        driver: &D,
        clickable: &E,
        timeout: Duration,
        filter: &dyn FileFilter,
        action: &A,
    ) -> Result<ArchivedFile, DownloadError>
    where
        D: BrowserDriver + ?Sized,
        E: ?Sized + Sync,
        A: DownloadAction<D, E> + ?Sized,
    {
        let channel = init_devtools(driver)?;
        let downloads_folder = driver.downloads_folder();

        let session = Arc::new(DownloadSession::new());
        let subscription =
            EventSubscription::arm(channel.as_ref(), Arc::clone(&session), downloads_folder)
                .await?;

        action
            .perform(driver, clickable)
            .await
            .map_err(DownloadError::Action)?;

        let polling_interval = effective_polling_interval(self.config.polling_interval);
        let outcome =
            wait_until_downloaded(&session, Deadline::new(timeout), polling_interval).await;
        drop(subscription);

        let file_name = match outcome {
            WaitOutcome::Succeeded => session
                .suggested_file_name()
                .ok_or(DownloadError::MissingFileName)?,
            WaitOutcome::Failed(failure) => {
                warn!(?failure, "download failed in browser");
                return Err(failure.into());
            }
            WaitOutcome::TimedOut => {
                warn!(timeout_ms = timeout.as_millis(), "download did not finish in time");
                return Err(DownloadError::timeout(timeout));
            }
        };

        let file = DownloadedFile::new(resolve_download_path(downloads_folder, &file_name)?);
        debug!(path = %file.path().display(), "file download is complete");
        filter::verify(filter, &file, timeout)?;

        let archived = self.archiver.archive(file.path()).await?;
        info!(path = %archived.path().display(), bytes = archived.size, "download archived");
        Ok(archived)
    }
}

/// Waits until `session` completes or fails, or `deadline` passes.
///
/// Checks run in that order on every wake-up. Wake-ups happen on each polling
/// tick and immediately whenever the session changes.
pub async fn wait_until_downloaded(
    session: &DownloadSession,
    deadline: Deadline,
    polling_interval: Duration,
) -> WaitOutcome {
    loop {
        let changed = session.changed();
        tokio::pin!(changed);
        // Register interest before checking, so a change in between still wakes us.
        changed.as_mut().enable();

        if session.is_completed() {
            return WaitOutcome::Succeeded;
        }
        if let Some(failure) = session.failure() {
            return WaitOutcome::Failed(failure);
        }
        if deadline.has_elapsed() {
            return WaitOutcome::TimedOut;
        }

        tokio::select! {
            () = changed => {}
            () = deadline.sleep(polling_interval) => {}
        }
    }
}

fn init_devtools<D>(driver: &D) -> Result<Arc<dyn ControlChannel>, DownloadError>
where
    D: BrowserDriver + ?Sized,
{
    let browser = driver.browser();
    if !browser.is_chromium() {
        return Err(DownloadError::unsupported(&browser.name));
    }
    driver
        .devtools()
        .ok_or_else(|| DownloadError::unsupported(&browser.name))
}

fn resolve_download_path(folder: &Path, file_name: &str) -> Result<PathBuf, DownloadError> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(folder.join(file_name)),
        _ => Err(DownloadError::UnsafeFileName {
            name: file_name.to_string(),
        }),
    }
}
