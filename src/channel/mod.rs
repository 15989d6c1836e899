//! Browser control channel boundary.
//!
//! The engine talks to a running browser through a `DevTools`-style protocol:
//! JSON commands go out, JSON events come back. This module defines the seam
//! ([`ControlChannel`]) and the handful of protocol messages the download flow
//! needs. Transports (websocket sessions, in-process fakes) live outside the
//! engine and implement the trait.
//!
//! # Example
//!
//! ```no_run
//! use cdp_download::channel::{Command, ControlChannel, DownloadBehavior};
//! use std::path::Path;
//!
//! # async fn example(channel: &dyn ControlChannel) -> Result<(), Box<dyn std::error::Error>> {
//! channel.send(Command::page_enable()).await?;
//! let behavior = DownloadBehavior::allow_into(Path::new("/tmp/downloads"));
//! channel.send(Command::set_download_behavior(&behavior)?).await?;
//! # Ok(())
//! # }
//! ```

mod events;
pub mod probe;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

pub use events::{
    Behavior, DownloadBehavior, DownloadEvent, DownloadProgress, DownloadState, DownloadWillBegin,
};
pub use probe::{BrowserVersion, DevToolsProbe, ProbeError};

/// Stream of events from one subscription. The stream ending means the channel is gone.
pub type EventStream = BoxStream<'static, RawEvent>;

/// Errors raised by a control channel transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The browser answered a command with a protocol error.
    #[error("command {method} rejected by browser: {message}")]
    CommandRejected {
        /// Protocol method that failed.
        method: String,
        /// Error message reported by the browser.
        message: String,
    },

    /// The underlying session or connection is gone.
    #[error("control channel closed while sending {method}")]
    Closed {
        /// Protocol method that could not be delivered.
        method: String,
    },

    /// An event or response payload did not have the expected shape.
    #[error("malformed {method} payload: {source}")]
    Malformed {
        /// Protocol method of the payload.
        method: String,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}

impl ChannelError {
    /// Creates a command-rejected error.
    pub fn rejected(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandRejected {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Creates a channel-closed error.
    pub fn closed(method: impl Into<String>) -> Self {
        Self::Closed {
            method: method.into(),
        }
    }

    /// Creates a malformed-payload error.
    pub fn malformed(method: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Malformed {
            method: method.into(),
            source,
        }
    }
}

/// A protocol command: method name plus JSON parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Protocol method, e.g. `Browser.setDownloadBehavior`.
    pub method: String,
    /// Parameters object.
    pub params: Value,
}

impl Command {
    /// Creates a command with arbitrary parameters.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// `Page.enable`, turns on page domain notifications.
    #[must_use]
    pub fn page_enable() -> Self {
        Self::new("Page.enable", Value::Object(serde_json::Map::new()))
    }

    /// `Browser.setDownloadBehavior` with the given behavior.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Malformed`] if the behavior cannot be serialized.
    pub fn set_download_behavior(behavior: &DownloadBehavior) -> Result<Self, ChannelError> {
        let method = "Browser.setDownloadBehavior";
        let params =
            serde_json::to_value(behavior).map_err(|e| ChannelError::malformed(method, e))?;
        Ok(Self::new(method, params))
    }
}

/// An event as delivered by the transport, before typed decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Protocol method, e.g. `Browser.downloadProgress`.
    pub method: String,
    /// Event parameters.
    pub params: Value,
}

impl RawEvent {
    /// Creates a raw event.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// A remote-debugging session attached to one browser instance.
///
/// Implementations must be shareable across tasks: the engine sends commands
/// from the caller's task while a separate task drains [`ControlChannel::events`].
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Sends a command and waits for the browser's result object.
    async fn send(&self, command: Command) -> Result<Value, ChannelError>;

    /// Opens a new subscription to every event emitted from now on.
    fn events(&self) -> EventStream;
}
