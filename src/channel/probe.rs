//! `DevTools` endpoint discovery over HTTP.
//!
//! Chromium-family browsers started with `--remote-debugging-port` answer
//! `GET /json/version` with their product string, protocol version and the
//! websocket URL a [`ControlChannel`](super::ControlChannel) transport attaches
//! to. Probing the endpoint is the cheapest way to check, before running a
//! test, that the browser supports download events at all.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Default connect timeout for the probe request.
const PROBE_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default read timeout for the probe request.
const PROBE_READ_TIMEOUT_SECS: u64 = 10;

/// Product prefixes of browsers that speak the Chrome `DevTools` protocol.
const CHROMIUM_PRODUCTS: &[&str] = &["chrome", "chromium", "headlesschrome", "edg", "opera"];

/// Errors from probing a `DevTools` endpoint.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The endpoint is not a valid http(s) URL.
    #[error("invalid DevTools endpoint: {endpoint}")]
    InvalidEndpoint {
        /// The rejected endpoint.
        endpoint: String,
    },

    /// Connection-level failure.
    #[error("network error probing {url}: {source}")]
    Network {
        /// URL that was requested.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} probing {url}")]
    HttpStatus {
        /// URL that was requested.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// The body was not a `DevTools` version document.
    #[error("unexpected response from {url}: {source}")]
    InvalidBody {
        /// URL that was requested.
        url: String,
        /// Decoding failure.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Document served at `/json/version`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrowserVersion {
    /// Product string, e.g. `Chrome/120.0.6099.109`.
    #[serde(rename = "Browser")]
    pub browser: String,
    /// `DevTools` protocol version, e.g. `1.3`.
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    /// User agent of the browser.
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,
    /// Websocket URL of the browser target.
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

impl BrowserVersion {
    /// Product name without the version, lowercased (`chrome`, `edg`, ...).
    #[must_use]
    pub fn product(&self) -> String {
        self.browser
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }

    /// Whether this browser emits `Browser.downloadWillBegin` / `downloadProgress`.
    ///
    /// Requires a Chromium-family product and protocol version 1.3 or newer.
    #[must_use]
    pub fn supports_download_events(&self) -> bool {
        let product = self.product();
        let chromium = CHROMIUM_PRODUCTS.iter().any(|p| product == *p);
        chromium && protocol_at_least(&self.protocol_version, (1, 3))
    }
}

fn protocol_at_least(version: &str, minimum: (u32, u32)) -> bool {
    let mut parts = version.trim().split('.');
    let major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minor = parts.next().map_or(Some(0), |p| p.parse::<u32>().ok());
    match (major, minor) {
        (Some(major), Some(minor)) => (major, minor) >= minimum,
        _ => false,
    }
}

/// HTTP probe for `DevTools` endpoints.
#[derive(Debug, Clone)]
pub struct DevToolsProbe {
    client: Client,
}

impl DevToolsProbe {
    /// Creates a probe with default timeouts (5s connect, 10s read).
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Client`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_timeouts(
            Duration::from_secs(PROBE_CONNECT_TIMEOUT_SECS),
            Duration::from_secs(PROBE_READ_TIMEOUT_SECS),
        )
    }

    /// Creates a probe with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Client`] if the HTTP client cannot be built.
    pub fn with_timeouts(connect: Duration, read: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .connect_timeout(connect)
            .read_timeout(read)
            .build()
            .map_err(ProbeError::Client)?;
        Ok(Self { client })
    }

    /// Fetches `<endpoint>/json/version`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProbeError`] when the endpoint is invalid, unreachable, or
    /// does not answer with a version document.
    #[instrument(level = "debug", skip(self))]
    pub async fn probe(&self, endpoint: &str) -> Result<BrowserVersion, ProbeError> {
        let url = version_url(endpoint)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ProbeError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let version = response
            .json::<BrowserVersion>()
            .await
            .map_err(|source| ProbeError::InvalidBody {
                url: url.to_string(),
                source,
            })?;
        debug!(browser = %version.browser, protocol = %version.protocol_version, "probed DevTools endpoint");
        Ok(version)
    }
}

fn version_url(endpoint: &str) -> Result<Url, ProbeError> {
    let invalid = || ProbeError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
    };
    let mut base = Url::parse(endpoint.trim()).map_err(|_| invalid())?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid());
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("json/version").map_err(|_| invalid())
}
