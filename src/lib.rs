//! CDP Download Library
//!
//! Synchronizes a UI-test action that triggers a browser download with the
//! browser's own download events, received over the Chrome `DevTools` protocol,
//! and relocates the finished file into a private archive folder.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`coordinator`] - End-to-end download flow and wait loop
//! - [`session`] - Shared state between the event feed and the waiting caller
//! - [`adapter`] - Turns `DevTools` download events into session updates
//! - [`channel`] - Control channel abstraction, protocol messages and endpoint probe
//! - [`driver`] - Browser, clickable element and action abstractions
//! - [`filter`] - Validation of the downloaded file
//! - [`archive`] - Relocation into unique archive folders
//! - [`deadline`] - Timeout bookkeeping for the wait loop
//! - [`config`] - Defaults and TOML configuration
//! - [`error`] - Error types

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod archive;
pub mod channel;
pub mod config;
pub mod coordinator;
pub mod deadline;
pub mod driver;
pub mod error;
pub mod filter;
pub mod session;

// Re-export commonly used types
pub use archive::{ArchivedFile, Archiver};
pub use channel::{ChannelError, Command, ControlChannel, DevToolsProbe, EventStream, RawEvent};
pub use config::{ConfigError, DownloadConfig};
pub use coordinator::{DownloadCoordinator, WaitOutcome, wait_until_downloaded};
pub use deadline::{Deadline, MIN_POLLING_INTERVAL};
pub use driver::{ActionError, Browser, BrowserDriver, Click, Clickable, DownloadAction};
pub use error::DownloadError;
pub use filter::{DownloadedFile, FileFilter};
pub use session::{DownloadSession, SessionFailure};
