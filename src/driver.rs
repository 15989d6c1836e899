//! Browser driver boundary and download-triggering actions.
//!
//! The engine does not launch or own browsers. Callers hand it a
//! [`BrowserDriver`] for the browser under test and an action that starts the
//! download, typically a [`Click`] on some element.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::channel::ControlChannel;

/// Error raised by a caller-supplied action. Propagated out of a download unmodified.
pub type ActionError = Box<dyn Error + Send + Sync>;

/// Browser names that run on Chromium and expose the `DevTools` protocol.
const CHROMIUM_BROWSERS: &[&str] = &["chrome", "chromium", "edge", "msedge", "opera", "brave"];

/// Identity of the browser behind a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Browser {
    /// Browser name as configured (`chrome`, `firefox`, ...).
    pub name: String,
}

impl Browser {
    /// Creates a browser identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Whether the browser is Chromium based.
    #[must_use]
    pub fn is_chromium(&self) -> bool {
        let name = self.name.trim().to_lowercase();
        CHROMIUM_BROWSERS.contains(&name.as_str())
    }
}

/// A running browser the download flow operates on.
///
/// Passed explicitly to every call; the engine keeps no global driver.
pub trait BrowserDriver: Send + Sync {
    /// Identity of the browser.
    fn browser(&self) -> &Browser;

    /// Folder the browser saves downloads into.
    fn downloads_folder(&self) -> &Path;

    /// Remote-debugging session for this browser, `None` when unsupported.
    fn devtools(&self) -> Option<Arc<dyn ControlChannel>>;
}

/// An element that can be clicked.
#[async_trait]
pub trait Clickable: Send + Sync {
    /// Clicks the element.
    async fn click(&self) -> Result<(), ActionError>;
}

/// UI interaction expected to start a download.
#[async_trait]
pub trait DownloadAction<D: ?Sized + Sync, E: ?Sized + Sync>: Send + Sync {
    /// Performs the interaction on `clickable`.
    async fn perform(&self, driver: &D, clickable: &E) -> Result<(), ActionError>;
}

/// Default action: click the element.
#[derive(Debug, Clone, Copy, Default)]
pub struct Click;

#[async_trait]
impl<D, E> DownloadAction<D, E> for Click
where
    D: ?Sized + Sync,
    E: Clickable + ?Sized,
{
    async fn perform(&self, _driver: &D, clickable: &E) -> Result<(), ActionError> {
        clickable.click().await
    }
}
