//! Login state machine for the portal's identity provider.

use std::fmt;
use std::time::Duration;

use antel_browser::{BrowserError, Frame, LoadState, Locator, PageDriver};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{Credentials, PortalUrls, Timeouts};
use crate::error::{ErrorKind, FetchError};

/// "Use username and password" on the provider's method chooser.
const METHOD_AFFORDANCES: &[Locator] = &[
    Locator::role("button", "usuario y contrase"),
    Locator::role("link", "usuario y contrase"),
    Locator::text("a, button, div[role=\"button\"]", "usuario y contraseña"),
];

const USERNAME_FIELDS: &[Locator] = &[
    Locator::role("textbox", "usuario|documento|correo|email"),
    Locator::css("input[type=\"email\"]"),
    Locator::css("input[name*=\"user\" i], input[id*=\"user\" i]"),
    Locator::css("input[type=\"text\"]"),
];

const CONTINUE_BUTTONS: &[Locator] = &[
    Locator::role("button", "continuar|siguiente"),
    Locator::css("button[type=\"submit\"], input[type=\"submit\"]"),
];

const PASSWORD_FIELDS: &[Locator] = &[
    Locator::css("input[type=\"password\"]"),
    Locator::role("textbox", "contraseña|password"),
];

const SUBMIT_BUTTONS: &[Locator] = &[
    Locator::role("button", "ingresar|iniciar|entrar|login|continuar"),
    Locator::css("button[type=\"submit\"], input[type=\"submit\"]"),
];

const LOGIN_ERRORS: &[Locator] = &[
    Locator::css(".alert-danger"),
    Locator::css(".login-error"),
    Locator::css(".error"),
    Locator::css("[class*=\"error\"]"),
    Locator::css("[class*=\"invalid\"]"),
];

/// Interval between probes while waiting for an element.
const ELEMENT_POLL: Duration = Duration::from_millis(250);

/// Position in the login sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Start,
    NavigatedToLogin,
    MethodSelected,
    UsernameEntered,
    UsernameSubmitted,
    PasswordEntered,
    PasswordSubmitted,
    LoginConfirmed,
    Failed(ErrorKind),
}

impl LoginState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoginConfirmed | Self::Failed(_))
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::NavigatedToLogin => f.write_str("navigated to login"),
            Self::MethodSelected => f.write_str("method selected"),
            Self::UsernameEntered => f.write_str("username entered"),
            Self::UsernameSubmitted => f.write_str("username submitted"),
            Self::PasswordEntered => f.write_str("password entered"),
            Self::PasswordSubmitted => f.write_str("password submitted"),
            Self::LoginConfirmed => f.write_str("login confirmed"),
            Self::Failed(kind) => write!(f, "failed ({})", kind),
        }
    }
}

/// Drives one login attempt on a page.
pub struct Authenticator<'a> {
    page: &'a dyn PageDriver,
    credentials: &'a Credentials,
    urls: &'a PortalUrls,
    timeouts: &'a Timeouts,
    state: LoginState,
    username_field: Option<(Frame, Locator)>,
    password_field: Option<(Frame, Locator)>,
}

impl<'a> Authenticator<'a> {
    pub fn new(
        page: &'a dyn PageDriver,
        credentials: &'a Credentials,
        urls: &'a PortalUrls,
        timeouts: &'a Timeouts,
    ) -> Self {
        Self {
            page,
            credentials,
            urls,
            timeouts,
            state: LoginState::Start,
            username_field: None,
            password_field: None,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    /// Runs the sequence until it is confirmed or fails.
    pub async fn run(&mut self) -> Result<(), FetchError> {
        while !self.state.is_terminal() {
            match self.step().await {
                Ok(next) => {
                    info!("Login: {} -> {}", self.state, next);
                    self.state = next;
                }
                Err(err) => {
                    self.state = LoginState::Failed(err.kind());
                    warn!("Login failed: {}", err);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn step(&mut self) -> Result<LoginState, FetchError> {
        match self.state {
            LoginState::Start => {
                self.page
                    .goto(
                        &self.urls.login,
                        LoadState::DomContentLoaded,
                        self.timeouts.navigation,
                    )
                    .await
                    .map_err(|e| FetchError::from_browser("login page", e))?;
                Ok(LoginState::NavigatedToLogin)
            }
            LoginState::NavigatedToLogin => {
                for locator in METHOD_AFFORDANCES {
                    if self
                        .page
                        .click(Frame::Main, locator)
                        .await
                        .map_err(|e| FetchError::from_browser("login method", e))?
                    {
                        debug!("Selected password login via {}", locator);
                        break;
                    }
                }
                Ok(LoginState::MethodSelected)
            }
            LoginState::MethodSelected => {
                let found = self
                    .wait_for_any(USERNAME_FIELDS, self.timeouts.element, ELEMENT_POLL)
                    .await
                    .map_err(|e| FetchError::from_browser("username field", e))?;
                let Some((frame, locator)) = found else {
                    return Err(FetchError::auth("username field not found"));
                };
                let filled = self
                    .page
                    .fill(frame, &locator, self.credentials.username())
                    .await
                    .map_err(|e| FetchError::from_browser("username field", e))?;
                if !filled {
                    return Err(FetchError::auth("username field could not be filled"));
                }
                self.username_field = Some((frame, locator));
                Ok(LoginState::UsernameEntered)
            }
            LoginState::UsernameEntered => {
                let Some((frame, field)) = self.username_field.clone() else {
                    return Err(FetchError::auth("username field lost"));
                };
                self.submit(frame, CONTINUE_BUTTONS, &field, "username")
                    .await?;
                Ok(LoginState::UsernameSubmitted)
            }
            LoginState::UsernameSubmitted => {
                let found = self
                    .wait_for_any(
                        PASSWORD_FIELDS,
                        self.timeouts.password_field,
                        self.timeouts.password_poll,
                    )
                    .await
                    .map_err(|e| FetchError::from_browser("password field", e))?;
                let Some((frame, locator)) = found else {
                    return Err(FetchError::auth(format!(
                        "password field did not appear within {:.0}s",
                        self.timeouts.password_field.as_secs_f64()
                    )));
                };
                debug!("Password field found in {}", frame);
                let filled = self
                    .page
                    .fill(frame, &locator, self.credentials.password())
                    .await
                    .map_err(|e| FetchError::from_browser("password field", e))?;
                if !filled {
                    return Err(FetchError::auth("password field could not be filled"));
                }
                self.password_field = Some((frame, locator));
                Ok(LoginState::PasswordEntered)
            }
            LoginState::PasswordEntered => {
                let Some((frame, field)) = self.password_field.clone() else {
                    return Err(FetchError::auth("password field lost"));
                };
                self.submit(frame, SUBMIT_BUTTONS, &field, "password")
                    .await?;
                Ok(LoginState::PasswordSubmitted)
            }
            LoginState::PasswordSubmitted => {
                match self
                    .page
                    .wait_for_load_state(LoadState::NetworkIdle, self.timeouts.settle)
                    .await
                {
                    Ok(()) => {}
                    Err(e) if e.is_timeout() => {
                        warn!("Post-login page did not settle, continuing: {}", e);
                    }
                    Err(e) => return Err(FetchError::from_browser("post-login settle", e)),
                }
                if let Some(message) = self
                    .login_error()
                    .await
                    .map_err(|e| FetchError::from_browser("login result", e))?
                {
                    return Err(FetchError::auth(format!("portal rejected login: {}", message)));
                }
                Ok(LoginState::LoginConfirmed)
            }
            LoginState::LoginConfirmed | LoginState::Failed(_) => Ok(self.state),
        }
    }

    /// Clicks the first available button, falling back to Enter in `field`.
    async fn submit(
        &self,
        frame: Frame,
        buttons: &[Locator],
        field: &Locator,
        what: &str,
    ) -> Result<(), FetchError> {
        let step = format!("{} submit", what);
        for button in buttons {
            if self
                .page
                .click(frame, button)
                .await
                .map_err(|e| FetchError::from_browser(step.clone(), e))?
            {
                debug!("Submitted {} via {}", what, button);
                return Ok(());
            }
        }
        let pressed = self
            .page
            .press_enter(frame, field)
            .await
            .map_err(|e| FetchError::from_browser(step.clone(), e))?;
        if pressed {
            debug!("Submitted {} with Enter", what);
            Ok(())
        } else {
            Err(FetchError::auth(format!("could not submit {}", what)))
        }
    }

    /// Polls the main document and every child frame until one of
    /// `locators` is visible. `Ok(None)` once `budget` runs out.
    async fn wait_for_any(
        &self,
        locators: &[Locator],
        budget: Duration,
        interval: Duration,
    ) -> Result<Option<(Frame, Locator)>, BrowserError> {
        let poll = async {
            loop {
                if let Some(hit) = self.probe_frames(locators).await? {
                    return Ok::<_, BrowserError>(hit);
                }
                sleep(interval).await;
            }
        };
        match timeout(budget, poll).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn probe_frames(
        &self,
        locators: &[Locator],
    ) -> Result<Option<(Frame, Locator)>, BrowserError> {
        let frames = match self.page.frame_count().await {
            Ok(count) => count,
            Err(BrowserError::Disconnected) => return Err(BrowserError::Disconnected),
            Err(e) => {
                debug!("Frame count unavailable: {}", e);
                0
            }
        };
        for frame in Frame::all(frames) {
            for locator in locators {
                match self.page.is_visible(frame, locator).await {
                    Ok(true) => return Ok(Some((frame, locator.clone()))),
                    Ok(false) => {}
                    Err(BrowserError::Disconnected) => return Err(BrowserError::Disconnected),
                    // Documents are torn down while the form moves between steps.
                    Err(e) => debug!("Probe of {} in {} failed: {}", locator, frame, e),
                }
            }
        }
        Ok(None)
    }

    /// Text of a visible login error banner, if any.
    async fn login_error(&self) -> Result<Option<String>, BrowserError> {
        let frames = self.page.frame_count().await.unwrap_or(0);
        for frame in Frame::all(frames) {
            for locator in LOGIN_ERRORS {
                if !self.page.is_visible(frame, locator).await.unwrap_or(false) {
                    continue;
                }
                let text = self.page.text_content(frame, locator).await?;
                if let Some(text) = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
                    return Ok(Some(text));
                }
            }
        }
        Ok(None)
    }
}
