//! Browser abstraction used by the consumption pipeline.
//!
//! The pipeline only talks to these traits. The chromiumoxide-backed
//! implementation lives in [`crate::chromium`]; tests substitute scripted
//! in-memory pages.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{BrowserError, Frame, LoadState, Locator};

/// Rendered state of one document, captured for offline extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Serialized DOM (`documentElement.outerHTML`).
    pub html: String,
    /// Rendered, visible text of `<body>` (`innerText`).
    pub body_text: String,
}

/// Rendered state of a page and its child frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub url: String,
    pub main: FrameSnapshot,
    pub frames: Vec<FrameSnapshot>,
}

impl DocumentSnapshot {
    /// Main document first, then child frames in document order.
    pub fn documents(&self) -> impl Iterator<Item = &FrameSnapshot> {
        std::iter::once(&self.main).chain(self.frames.iter())
    }
}

/// One browser tab.
///
/// Element operations return `Ok(false)` / `Ok(None)` when the locator matches
/// nothing; `Err` is reserved for the browser failing to answer.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url` and wait until `until` holds or `timeout` elapses.
    async fn goto(&self, url: &str, until: LoadState, timeout: Duration)
        -> Result<(), BrowserError>;

    /// Wait for the current document to reach `until`.
    async fn wait_for_load_state(
        &self,
        until: LoadState,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Number of child frames currently attached to the page.
    async fn frame_count(&self) -> Result<usize, BrowserError>;

    /// Whether a visible element matches `locator` in `frame`.
    async fn is_visible(&self, frame: Frame, locator: &Locator) -> Result<bool, BrowserError>;

    /// Click the first visible match. `Ok(false)` if there is none.
    async fn click(&self, frame: Frame, locator: &Locator) -> Result<bool, BrowserError>;

    /// Replace the value of the first visible match, firing input events.
    async fn fill(&self, frame: Frame, locator: &Locator, value: &str)
        -> Result<bool, BrowserError>;

    /// Press Enter in the first visible match, submitting its form.
    async fn press_enter(&self, frame: Frame, locator: &Locator) -> Result<bool, BrowserError>;

    /// Text content of the first match (visible or not).
    async fn text_content(
        &self,
        frame: Frame,
        locator: &Locator,
    ) -> Result<Option<String>, BrowserError>;

    /// Resolved `href` of the first match.
    async fn link_target(
        &self,
        frame: Frame,
        locator: &Locator,
    ) -> Result<Option<String>, BrowserError>;

    /// Capture the main document and every child frame.
    async fn snapshot(&self) -> Result<DocumentSnapshot, BrowserError>;
}

/// An isolated browsing context (own cookies and storage) holding one page.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    fn page(&self) -> &dyn PageDriver;

    /// Dispose the context and every page in it.
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// A running browser.
#[async_trait]
pub trait Session: Send + Sync {
    /// Whether the browser still answers protocol commands.
    async fn is_connected(&self) -> bool;

    async fn new_context(&self) -> Result<Box<dyn BrowserContext>, BrowserError>;

    /// Shut the browser down. Calling it twice is harmless.
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Starts browsers.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Session>, BrowserError>;
}
