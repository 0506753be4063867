//! Driver implementation backed by a local Chrome/Chromium over DevTools.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::{
    CreateIsolatedWorldParams, FrameId, FrameTree, GetFrameTreeParams, NavigateParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

use crate::driver::{BrowserContext, DocumentSnapshot, FrameSnapshot, Launcher, PageDriver, Session};
use crate::script;
use crate::user_agent::get_user_agent;
use crate::{BrowserError, Frame, LoadState, Locator};

const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(250);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const ISOLATED_WORLD: &str = "antel_consumo";

/// Options for starting the browser process.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub headless: bool,
    /// Explicit browser binary; autodetected when `None`.
    pub chrome_executable: Option<PathBuf>,
    pub viewport: (u32, u32),
    /// Fixed user agent; a desktop Chrome one is picked per context when `None`.
    pub user_agent: Option<String>,
    /// How long the resource count must stay flat to count as network idle.
    pub idle_quiet_period: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            viewport: (1280, 720),
            user_agent: None,
            idle_quiet_period: Duration::from_millis(500),
        }
    }
}

/// Starts headless Chromium processes.
pub struct ChromiumLauncher {
    config: LaunchConfig,
}

impl ChromiumLauncher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }
}

impl Default for ChromiumLauncher {
    fn default() -> Self {
        Self::new(LaunchConfig::default())
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn Session>, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            .viewport(None);
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move { while (handler.next().await).is_some() {} });
        tracing::debug!("Browser launched (headless={})", self.config.headless);

        Ok(Box::new(ChromiumSession {
            browser: Arc::new(browser),
            handler: Some(handler),
            config: self.config.clone(),
        }))
    }
}

/// A running Chromium process and its event-loop task.
pub struct ChromiumSession {
    browser: Arc<Browser>,
    handler: Option<JoinHandle<()>>,
    config: LaunchConfig,
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

#[async_trait]
impl Session for ChromiumSession {
    async fn is_connected(&self) -> bool {
        let Some(handler) = &self.handler else {
            return false;
        };
        if handler.is_finished() {
            return false;
        }
        matches!(
            timeout(PROBE_TIMEOUT, self.browser.version()).await,
            Ok(Ok(_))
        )
    }

    async fn new_context(&self) -> Result<Box<dyn BrowserContext>, BrowserError> {
        if self.handler.is_none() {
            return Err(BrowserError::Disconnected);
        }
        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?
            .result
            .browser_context_id
            .clone();

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(BrowserError::Protocol)?;
        let page = self.browser.new_page(target).await?;

        let user_agent = self
            .config
            .user_agent
            .clone()
            .unwrap_or_else(|| get_user_agent().to_string());
        page.execute(SetUserAgentOverrideParams::new(user_agent))
            .await?;
        let (width, height) = self.config.viewport;
        page.execute(SetDeviceMetricsOverrideParams::new(
            width as i64,
            height as i64,
            1.0,
            false,
        ))
        .await?;

        Ok(Box::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            context_id,
            page: ChromiumPage {
                page,
                idle_quiet_period: self.config.idle_quiet_period,
                worlds: WorldCache::default(),
            },
        }))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        let Some(handler) = self.handler.take() else {
            return Ok(());
        };
        let result = match timeout(PROBE_TIMEOUT, self.browser.execute(CloseParams::default())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::from(e)),
            Err(_) => Err(BrowserError::timeout("browser shutdown", PROBE_TIMEOUT)),
        };
        handler.abort();
        tracing::debug!("Browser closed");
        result
    }
}

/// An incognito-style browser context with a single page.
pub struct ChromiumContext {
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    page: ChromiumPage,
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    fn page(&self) -> &dyn PageDriver {
        &self.page
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.browser
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct LocateResult {
    found: bool,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ReadyProbe {
    ready_state: String,
    resources: u64,
}

/// Isolated-world execution contexts already created, one per child frame.
///
/// An entry goes stale when its frame navigates; callers forget it and
/// create a new world.
#[derive(Default)]
struct WorldCache {
    worlds: Mutex<HashMap<FrameId, ExecutionContextId>>,
}

impl WorldCache {
    fn get(&self, frame: &FrameId) -> Option<ExecutionContextId> {
        self.lock().get(frame).cloned()
    }

    fn insert(&self, frame: FrameId, context: ExecutionContextId) {
        self.lock().insert(frame, context);
    }

    fn forget(&self, frame: &FrameId) {
        self.lock().remove(frame);
    }

    fn clear(&self) {
        self.lock().clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<FrameId, ExecutionContextId>> {
        self.worlds.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One Chromium tab.
pub struct ChromiumPage {
    page: Page,
    idle_quiet_period: Duration,
    worlds: WorldCache,
}

impl ChromiumPage {
    async fn child_frames(&self) -> Result<Vec<FrameId>, BrowserError> {
        let tree = self
            .page
            .execute(GetFrameTreeParams::default())
            .await?
            .result
            .frame_tree
            .clone();
        let mut ids = Vec::new();
        collect_child_frames(&tree, &mut ids);
        Ok(ids)
    }

    async fn evaluate<T: DeserializeOwned>(
        &self,
        frame: Frame,
        expression: String,
    ) -> Result<T, BrowserError> {
        let Frame::Child(index) = frame else {
            return self.evaluate_in(expression, None).await;
        };
        let frame_id = self
            .child_frames()
            .await?
            .into_iter()
            .nth(index)
            .ok_or(BrowserError::FrameDetached(index))?;

        if let Some(context) = self.worlds.get(&frame_id) {
            match self.evaluate_in(expression.clone(), Some(context)).await {
                Err(BrowserError::Protocol(e)) => {
                    tracing::trace!("Isolated world for frame {} is stale: {}", index, e);
                    self.worlds.forget(&frame_id);
                }
                other => return other,
            }
        }
        let context = self.create_world(frame_id.clone()).await?;
        self.worlds.insert(frame_id, context.clone());
        self.evaluate_in(expression, Some(context)).await
    }

    async fn create_world(&self, frame_id: FrameId) -> Result<ExecutionContextId, BrowserError> {
        let world = CreateIsolatedWorldParams::builder()
            .frame_id(frame_id)
            .world_name(ISOLATED_WORLD)
            .build()
            .map_err(BrowserError::Protocol)?;
        Ok(self.page.execute(world).await?.result.execution_context_id.clone())
    }

    async fn evaluate_in<T: DeserializeOwned>(
        &self,
        expression: String,
        context: Option<ExecutionContextId>,
    ) -> Result<T, BrowserError> {
        let mut builder = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .await_promise(true);
        if let Some(context) = context {
            builder = builder.context_id(context);
        }
        let params = builder.build().map_err(BrowserError::Protocol)?;
        let resp = self.page.execute(params).await?;
        if let Some(details) = &resp.result.exception_details {
            return Err(BrowserError::Script(details.text.clone()));
        }
        let value = resp
            .result
            .result
            .value
            .clone()
            .unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    async fn locate(
        &self,
        frame: Frame,
        locator: &Locator,
        action: &str,
        value: Option<&str>,
    ) -> Result<LocateResult, BrowserError> {
        let expression = format!(
            "{}({}, {}, {})",
            script::LOCATE,
            serde_json::to_string(locator)?,
            serde_json::to_string(action)?,
            serde_json::to_string(&value)?,
        );
        self.evaluate(frame, expression).await
    }

    async fn key(&self, kind: DispatchKeyEventType) -> Result<(), BrowserError> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13);
        if kind == DispatchKeyEventType::KeyDown {
            builder = builder.text("\r");
        }
        let params = builder.build().map_err(BrowserError::Protocol)?;
        self.page.execute(params).await?;
        Ok(())
    }
}

fn collect_child_frames(tree: &FrameTree, out: &mut Vec<FrameId>) {
    for child in tree.child_frames.iter().flatten() {
        out.push(child.frame.id.clone());
        collect_child_frames(child, out);
    }
}

/// Chromium reports network failures as `net::ERR_*` strings on the
/// navigation result rather than as protocol errors.
fn navigation_error(url: &str, error_text: &str, waited: Duration) -> BrowserError {
    const CONNECTIVITY: &[&str] = &[
        "ERR_TIMED_OUT",
        "ERR_CONNECTION",
        "ERR_NAME_NOT_RESOLVED",
        "ERR_INTERNET_DISCONNECTED",
        "ERR_NETWORK_CHANGED",
        "ERR_ADDRESS_UNREACHABLE",
    ];
    if CONNECTIVITY.iter().any(|code| error_text.contains(code)) {
        BrowserError::timeout(format!("{} ({})", url, error_text), waited)
    } else {
        BrowserError::Protocol(format!("navigation to {} failed: {}", url, error_text))
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(
        &self,
        url: &str,
        until: LoadState,
        wait: Duration,
    ) -> Result<(), BrowserError> {
        let started = Instant::now();
        self.worlds.clear();
        let nav = timeout(wait, self.page.execute(NavigateParams::new(url)))
            .await
            .map_err(|_| BrowserError::timeout(format!("navigation to {}", url), wait))??;
        if let Some(error_text) = &nav.result.error_text {
            return Err(navigation_error(url, error_text, started.elapsed()));
        }
        self.wait_for_load_state(until, wait.saturating_sub(started.elapsed()))
            .await
    }

    async fn wait_for_load_state(
        &self,
        until: LoadState,
        wait: Duration,
    ) -> Result<(), BrowserError> {
        if until == LoadState::Commit {
            return Ok(());
        }
        let quiet = self.idle_quiet_period;
        let poll = async {
            let mut stable_since: Option<(u64, Instant)> = None;
            loop {
                match self
                    .evaluate::<ReadyProbe>(Frame::Main, script::READY_PROBE.to_string())
                    .await
                {
                    Ok(probe) => {
                        let reached = match until {
                            LoadState::Commit => true,
                            LoadState::DomContentLoaded => probe.ready_state != "loading",
                            LoadState::Load => probe.ready_state == "complete",
                            LoadState::NetworkIdle if probe.ready_state != "complete" => {
                                stable_since = None;
                                false
                            }
                            LoadState::NetworkIdle => match stable_since {
                                Some((count, since)) if count == probe.resources => {
                                    since.elapsed() >= quiet
                                }
                                _ => {
                                    stable_since = Some((probe.resources, Instant::now()));
                                    false
                                }
                            },
                        };
                        if reached {
                            return Ok(());
                        }
                    }
                    Err(BrowserError::Disconnected) => return Err(BrowserError::Disconnected),
                    // The execution context is torn down while a navigation commits.
                    Err(e) => tracing::trace!("Load state probe failed: {}", e),
                }
                sleep(LOAD_POLL_INTERVAL).await;
            }
        };
        timeout(wait, poll)
            .await
            .map_err(|_| BrowserError::timeout(format!("load state {}", until), wait))?
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn frame_count(&self) -> Result<usize, BrowserError> {
        Ok(self.child_frames().await?.len())
    }

    async fn is_visible(&self, frame: Frame, locator: &Locator) -> Result<bool, BrowserError> {
        Ok(self.locate(frame, locator, "visible", None).await?.found)
    }

    async fn click(&self, frame: Frame, locator: &Locator) -> Result<bool, BrowserError> {
        Ok(self.locate(frame, locator, "click", None).await?.found)
    }

    async fn fill(
        &self,
        frame: Frame,
        locator: &Locator,
        value: &str,
    ) -> Result<bool, BrowserError> {
        Ok(self.locate(frame, locator, "fill", Some(value)).await?.found)
    }

    async fn press_enter(&self, frame: Frame, locator: &Locator) -> Result<bool, BrowserError> {
        if !self.locate(frame, locator, "focus", None).await?.found {
            return Ok(false);
        }
        self.key(DispatchKeyEventType::KeyDown).await?;
        self.key(DispatchKeyEventType::KeyUp).await?;
        Ok(true)
    }

    async fn text_content(
        &self,
        frame: Frame,
        locator: &Locator,
    ) -> Result<Option<String>, BrowserError> {
        Ok(self.locate(frame, locator, "text", None).await?.text)
    }

    async fn link_target(
        &self,
        frame: Frame,
        locator: &Locator,
    ) -> Result<Option<String>, BrowserError> {
        Ok(self.locate(frame, locator, "href", None).await?.text)
    }

    async fn snapshot(&self) -> Result<DocumentSnapshot, BrowserError> {
        let url = self.current_url().await?;
        let main: FrameSnapshot = self
            .evaluate(Frame::Main, script::CAPTURE.to_string())
            .await?;
        let count = self.frame_count().await?;
        let mut frames = Vec::with_capacity(count);
        for index in 0..count {
            match self
                .evaluate::<FrameSnapshot>(Frame::Child(index), script::CAPTURE.to_string())
                .await
            {
                Ok(frame) => frames.push(frame),
                Err(e) => tracing::debug!("Skipping frame {} in snapshot: {}", index, e),
            }
        }
        Ok(DocumentSnapshot { url, main, frames })
    }
}
