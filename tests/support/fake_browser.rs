//! In-process fake of a Chromium browser with a DevTools channel.
//!
//! [`FakeChannel`] records every command and fans emitted events out to all
//! live subscriptions. [`FakeButton`] plays a [`DownloadScript`] when clicked:
//! it writes the file into the download folder, then emits the scripted events
//! from a background task, honoring the delays (virtual time in paused tests).

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cdp_download::channel::{ChannelError, Command, ControlChannel, EventStream, RawEvent};
use cdp_download::{ActionError, Browser, BrowserDriver, Clickable, DownloadAction};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// `Browser.downloadWillBegin` event.
pub fn will_begin(guid: &str, file_name: &str) -> RawEvent {
    RawEvent::new(
        "Browser.downloadWillBegin",
        json!({
            "frameId": "frame-1",
            "guid": guid,
            "url": format!("https://files.example.com/{file_name}"),
            "suggestedFilename": file_name,
        }),
    )
}

/// `Browser.downloadProgress` event.
pub fn progress(guid: &str, state: &str, received_bytes: u64) -> RawEvent {
    RawEvent::new(
        "Browser.downloadProgress",
        json!({
            "guid": guid,
            "totalBytes": received_bytes as f64,
            "receivedBytes": received_bytes as f64,
            "state": state,
        }),
    )
}

/// Remote-debugging channel driven by the test.
#[derive(Default)]
pub struct FakeChannel {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RawEvent>>>,
    commands: Mutex<Vec<Command>>,
    rejected_method: Mutex<Option<String>>,
}

impl FakeChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every future `method` command fail.
    pub fn reject(&self, method: &str) {
        *self.rejected_method.lock().unwrap() = Some(method.to_string());
    }

    /// Delivers `event` to every live subscription.
    pub fn emit(&self, event: RawEvent) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Ends every subscription, as a dropped websocket would.
    pub fn disconnect(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

#[async_trait]
impl ControlChannel for FakeChannel {
    async fn send(&self, command: Command) -> Result<Value, ChannelError> {
        if self.rejected_method.lock().unwrap().as_deref() == Some(command.method.as_str()) {
            return Err(ChannelError::rejected(command.method, "rejected by fake browser"));
        }
        self.commands.lock().unwrap().push(command);
        Ok(json!({}))
    }

    fn events(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        }))
    }
}

/// Browser with a temporary download folder.
pub struct FakeBrowser {
    browser: Browser,
    downloads: TempDir,
    channel: Option<Arc<FakeChannel>>,
}

impl FakeBrowser {
    pub fn chrome(channel: &Arc<FakeChannel>) -> Self {
        Self::new("chrome", Some(Arc::clone(channel)))
    }

    pub fn new(name: &str, channel: Option<Arc<FakeChannel>>) -> Self {
        Self {
            browser: Browser::new(name),
            downloads: TempDir::new().unwrap(),
            channel,
        }
    }
}

impl BrowserDriver for FakeBrowser {
    fn browser(&self) -> &Browser {
        &self.browser
    }

    fn downloads_folder(&self) -> &Path {
        self.downloads.path()
    }

    fn devtools(&self) -> Option<Arc<dyn ControlChannel>> {
        self.channel
            .as_ref()
            .map(|channel| Arc::clone(channel) as Arc<dyn ControlChannel>)
    }
}

#[derive(Clone)]
enum Step {
    Emit(RawEvent),
    Disconnect,
}

/// What the browser does once the download link is clicked.
#[derive(Clone)]
pub struct DownloadScript {
    channel: Arc<FakeChannel>,
    folder: PathBuf,
    file: Option<(String, Vec<u8>)>,
    steps: Vec<(Duration, Step)>,
}

impl DownloadScript {
    pub fn new(channel: &Arc<FakeChannel>, browser: &FakeBrowser) -> Self {
        Self {
            channel: Arc::clone(channel),
            folder: browser.downloads_folder().to_path_buf(),
            file: None,
            steps: Vec::new(),
        }
    }

    /// Writes `content` as `name` into the download folder on click.
    pub fn saves(mut self, name: &str, content: &[u8]) -> Self {
        self.file = Some((name.to_string(), content.to_vec()));
        self
    }

    /// Emits `event` `delay` after the previous step.
    pub fn then_emit(mut self, delay_ms: u64, event: RawEvent) -> Self {
        self.steps
            .push((Duration::from_millis(delay_ms), Step::Emit(event)));
        self
    }

    /// Drops the connection `delay` after the previous step.
    pub fn then_disconnect(mut self, delay_ms: u64) -> Self {
        self.steps
            .push((Duration::from_millis(delay_ms), Step::Disconnect));
        self
    }

    /// Shorthand for a complete, successful download of `name`.
    pub fn completes(self, name: &str, content: &[u8], after_ms: u64) -> Self {
        let size = content.len() as u64;
        self.saves(name, content)
            .then_emit(0, will_begin("guid-1", name))
            .then_emit(after_ms / 2, progress("guid-1", "inProgress", size / 2))
            .then_emit(after_ms - after_ms / 2, progress("guid-1", "completed", size))
    }

    fn play(&self) -> std::io::Result<()> {
        if let Some((name, content)) = &self.file {
            std::fs::write(self.folder.join(name), content)?;
        }
        let channel = Arc::clone(&self.channel);
        let steps = self.steps.clone();
        tokio::spawn(async move {
            for (delay, step) in steps {
                tokio::time::sleep(delay).await;
                match step {
                    Step::Emit(event) => channel.emit(event),
                    Step::Disconnect => channel.disconnect(),
                }
            }
        });
        Ok(())
    }
}

/// Download link that counts clicks and may fail.
#[derive(Default)]
pub struct FakeButton {
    clicks: AtomicUsize,
    failure: Option<String>,
    script: Option<DownloadScript>,
}

impl FakeButton {
    pub fn starting(script: DownloadScript) -> Self {
        Self {
            script: Some(script),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn clicks(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clickable for FakeButton {
    async fn click(&self) -> Result<(), ActionError> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(message.clone().into());
        }
        if let Some(script) = &self.script {
            script.play()?;
        }
        Ok(())
    }
}

/// Action that records the channel state at the moment it runs, then clicks.
#[derive(Default)]
pub struct RecordingAction {
    seen: Mutex<Option<(Vec<String>, usize)>>,
}

impl RecordingAction {
    /// Command methods sent and live subscriptions at the time of the action.
    pub fn seen(&self) -> Option<(Vec<String>, usize)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadAction<FakeBrowser, FakeButton> for RecordingAction {
    async fn perform(&self, driver: &FakeBrowser, button: &FakeButton) -> Result<(), ActionError> {
        if let Some(channel) = &driver.channel {
            let methods = channel.commands().into_iter().map(|c| c.method).collect();
            *self.seen.lock().unwrap() = Some((methods, channel.subscriber_count()));
        }
        button.click().await
    }
}
