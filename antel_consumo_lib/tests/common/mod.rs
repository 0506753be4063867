//! Scripted in-memory portal used by the pipeline tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use antel_browser::{
    BrowserContext, BrowserError, DocumentSnapshot, Frame, LoadState, Launcher, Locator,
    PageDriver, Session,
};
use antel_consumo_lib::extract::frame_from_html;
use antel_consumo_lib::{Credentials, FetchSettings, PortalUrls};
use async_trait::async_trait;
use tokio::time::Instant;

pub const LOGIN_URL: &str = "https://portal.test/acceder/login";
pub const HOME_URL: &str = "https://portal.test/";
pub const DASHBOARD_URL: &str = "https://apps.portal.test/dashboard/inicio";
pub const CONSUMO_URL: &str = "https://apps.portal.test/miAntel/consumo/internet";
pub const CARD_URL: &str = "https://apps.portal.test/miAntel/servicio/fibra";
pub const MENU_DASHBOARD_URL: &str = "https://apps.portal.test/dashboard/inicio?origen=menu";
pub const DETAIL_URL: &str = "https://apps.portal.test/miAntel/consumo/detalle";

pub const USERNAME: &str = "cliente@example.com";
pub const PASSWORD: &str = "s3creta";

pub fn settings() -> FetchSettings {
    let mut settings = FetchSettings::default();
    settings.urls = PortalUrls {
        login: LOGIN_URL.to_string(),
        home: HOME_URL.to_string(),
        self_service: DASHBOARD_URL.to_string(),
        consumption: CONSUMO_URL.to_string(),
    };
    settings
}

pub fn credentials() -> Credentials {
    Credentials::new(USERNAME, PASSWORD)
}

pub fn document(html: &str) -> DocumentSnapshot {
    DocumentSnapshot {
        url: CONSUMO_URL.to_string(),
        main: frame_from_html(html),
        frames: Vec::new(),
    }
}

pub fn messy_document() -> DocumentSnapshot {
    document(include_str!("../fixtures/consumo_messy.html"))
}

pub fn service_error_document() -> DocumentSnapshot {
    document(include_str!("../fixtures/service_error.html"))
}

/// Where the password field shows up after the username is submitted.
#[derive(Debug, Clone, Copy, Default)]
pub enum PasswordPlacement {
    #[default]
    Main,
    /// Inside child frame 0, once `delay` has passed.
    DelayedFrame(Duration),
    Never,
}

/// How the scripted portal behaves.
#[derive(Debug, Default)]
pub struct Script {
    /// Number of login page loads that time out before one succeeds.
    pub login_timeouts: usize,
    /// Login page loads never complete.
    pub hang_on_login: bool,
    pub password: PasswordPlacement,
    pub login_error: Option<String>,
    /// Detail page hides its data markers.
    pub hide_markers: bool,
    /// Captures handed out in order; the last one repeats.
    pub documents: Vec<DocumentSnapshot>,
    pub service_card: Option<String>,
    /// Self-service link offered on the home page.
    pub self_service_link: Option<String>,
    /// "detalle" link offered on the dashboard; its target always shows data.
    pub detail_link: Option<String>,
}

/// Everything the portal saw.
#[derive(Debug, Default)]
pub struct Log {
    pub gotos: Vec<String>,
    pub fills: Vec<(Frame, String)>,
    pub snapshots: usize,
    pub launches: usize,
    pub contexts_opened: usize,
    pub contexts_closed: usize,
    pub sessions_closed: usize,
}

impl Log {
    pub fn visits(&self, url: &str) -> usize {
        self.gotos.iter().filter(|u| u.as_str() == url).count()
    }
}

#[derive(Debug, Default)]
pub struct Portal {
    script: Mutex<Script>,
    log: Mutex<Log>,
    connected: Mutex<bool>,
}

impl Portal {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            log: Mutex::new(Log::default()),
            connected: Mutex::new(false),
        })
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap()
    }

    /// Simulates the browser process dying.
    pub fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }

    pub fn page(self: &Arc<Self>) -> ScriptedPage {
        ScriptedPage {
            portal: Arc::clone(self),
            state: Mutex::new(PageState::default()),
        }
    }
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    username_submitted_at: Option<Instant>,
    password_submitted: bool,
}

pub struct ScriptedPage {
    portal: Arc<Portal>,
    state: Mutex<PageState>,
}

fn is_role(locator: &Locator, role: &str, needle: &str) -> bool {
    matches!(locator, Locator::Role { role: r, name: Some(name) } if r.as_ref() == role && name.contains(needle))
}

fn is_css(locator: &Locator, selector: &str) -> bool {
    matches!(locator, Locator::Css { selector: s } if s.as_ref() == selector)
}

impl ScriptedPage {
    fn on(&self, url: &str) -> bool {
        self.state.lock().unwrap().url == url
    }

    fn password_frame(&self) -> Option<Frame> {
        let state = self.state.lock().unwrap();
        let submitted = state.username_submitted_at?;
        match self.portal.script.lock().unwrap().password {
            PasswordPlacement::Main => Some(Frame::Main),
            PasswordPlacement::DelayedFrame(delay) if Instant::now() >= submitted + delay => {
                Some(Frame::Child(0))
            }
            _ => None,
        }
    }

    fn banner_shown(&self) -> bool {
        self.state.lock().unwrap().password_submitted
            && self.portal.script.lock().unwrap().login_error.is_some()
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn goto(&self, url: &str, _until: LoadState, timeout: Duration) -> Result<(), BrowserError> {
        self.portal.log().gotos.push(url.to_string());
        if url == LOGIN_URL {
            let hang = {
                let mut script = self.portal.script.lock().unwrap();
                if script.login_timeouts > 0 {
                    script.login_timeouts -= 1;
                    return Err(BrowserError::timeout("navigation", timeout));
                }
                script.hang_on_login
            };
            if hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
        let mut state = self.state.lock().unwrap();
        *state = PageState {
            url: url.to_string(),
            ..PageState::default()
        };
        Ok(())
    }

    async fn wait_for_load_state(&self, _until: LoadState, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn frame_count(&self) -> Result<usize, BrowserError> {
        Ok(match self.password_frame() {
            Some(Frame::Child(_)) => 1,
            _ => 0,
        })
    }

    async fn is_visible(&self, frame: Frame, locator: &Locator) -> Result<bool, BrowserError> {
        if self.on(LOGIN_URL) {
            let username_pending = self.state.lock().unwrap().username_submitted_at.is_none();
            if frame == Frame::Main && is_role(locator, "textbox", "usuario") {
                return Ok(username_pending);
            }
            if is_css(locator, "input[type=\"password\"]") {
                return Ok(self.password_frame() == Some(frame));
            }
            if frame == Frame::Main && is_css(locator, ".alert-danger") {
                return Ok(self.banner_shown());
            }
            return Ok(false);
        }
        if self.on(CONSUMO_URL) || self.on(CARD_URL) {
            let hidden = self.portal.script.lock().unwrap().hide_markers;
            return Ok(!hidden && is_css(locator, ".progress-bar__label"));
        }
        if self.on(DETAIL_URL) {
            return Ok(is_css(locator, ".progress-bar__label"));
        }
        Ok(false)
    }

    async fn click(&self, frame: Frame, locator: &Locator) -> Result<bool, BrowserError> {
        if !self.on(LOGIN_URL) {
            return Ok(false);
        }
        if is_role(locator, "button", "ingresar") {
            if self.password_frame() != Some(frame) {
                return Ok(false);
            }
            self.state.lock().unwrap().password_submitted = true;
            return Ok(true);
        }
        if frame == Frame::Main && is_role(locator, "button", "continuar") {
            let mut state = self.state.lock().unwrap();
            if state.username_submitted_at.is_none() {
                state.username_submitted_at = Some(Instant::now());
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn fill(&self, frame: Frame, locator: &Locator, value: &str) -> Result<bool, BrowserError> {
        let visible = self.is_visible(frame, locator).await?;
        if visible {
            self.portal.log().fills.push((frame, value.to_string()));
        }
        Ok(visible)
    }

    async fn press_enter(&self, _frame: Frame, _locator: &Locator) -> Result<bool, BrowserError> {
        Ok(false)
    }

    async fn text_content(&self, frame: Frame, locator: &Locator) -> Result<Option<String>, BrowserError> {
        if self.on(LOGIN_URL) && frame == Frame::Main && is_css(locator, ".alert-danger") && self.banner_shown() {
            return Ok(self.portal.script.lock().unwrap().login_error.clone());
        }
        Ok(None)
    }

    async fn link_target(&self, _frame: Frame, locator: &Locator) -> Result<Option<String>, BrowserError> {
        let script = self.portal.script.lock().unwrap();
        if let Locator::LinkIn { .. } = locator {
            return Ok(script.service_card.clone());
        }
        if self.on(HOME_URL) && is_role(locator, "link", "autogesti") {
            return Ok(script.self_service_link.clone());
        }
        if (self.on(DASHBOARD_URL) || self.on(MENU_DASHBOARD_URL)) && is_role(locator, "link", "detalle") {
            return Ok(script.detail_link.clone());
        }
        Ok(None)
    }

    async fn snapshot(&self) -> Result<DocumentSnapshot, BrowserError> {
        let index = {
            let mut log = self.portal.log();
            log.snapshots += 1;
            log.snapshots - 1
        };
        let script = self.portal.script.lock().unwrap();
        let document = script
            .documents
            .get(index)
            .or_else(|| script.documents.last())
            .cloned()
            .unwrap_or_default();
        Ok(document)
    }
}

pub struct ScriptedContext {
    page: ScriptedPage,
    portal: Arc<Portal>,
}

#[async_trait]
impl BrowserContext for ScriptedContext {
    fn page(&self) -> &dyn PageDriver {
        &self.page
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.portal.log().contexts_closed += 1;
        Ok(())
    }
}

pub struct ScriptedSession {
    portal: Arc<Portal>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn is_connected(&self) -> bool {
        *self.portal.connected.lock().unwrap()
    }

    async fn new_context(&self) -> Result<Box<dyn BrowserContext>, BrowserError> {
        if !*self.portal.connected.lock().unwrap() {
            return Err(BrowserError::Disconnected);
        }
        self.portal.log().contexts_opened += 1;
        Ok(Box::new(ScriptedContext {
            page: self.portal.page(),
            portal: Arc::clone(&self.portal),
        }))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.portal.log().sessions_closed += 1;
        Ok(())
    }
}

pub struct ScriptedLauncher {
    pub portal: Arc<Portal>,
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn Session>, BrowserError> {
        self.portal.log().launches += 1;
        *self.portal.connected.lock().unwrap() = true;
        Ok(Box::new(ScriptedSession {
            portal: Arc::clone(&self.portal),
        }))
    }
}
