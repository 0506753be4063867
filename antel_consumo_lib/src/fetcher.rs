//! The fetcher façade: one owned browser session, one context per fetch.

use antel_browser::{BrowserContext, ChromiumLauncher, Launcher, PageDriver, Session};
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::auth::Authenticator;
use crate::config::{Credentials, FetchSettings};
use crate::error::{ErrorKind, FetchError};
use crate::navigate::Navigator;
use crate::snapshot::ConsumptionSnapshot;

/// Fetches consumption snapshots for one account.
///
/// Calls are serialized: the browser session is held behind an async mutex
/// for the whole of each fetch. The session is launched on first use and
/// relaunched if it is found dead; each fetch runs in a fresh browser context
/// that is disposed on every exit path.
pub struct ConsumptionFetcher<L: Launcher = ChromiumLauncher> {
    launcher: L,
    credentials: Credentials,
    settings: FetchSettings,
    session: Mutex<Option<Box<dyn Session>>>,
}

impl ConsumptionFetcher<ChromiumLauncher> {
    /// Fetcher driving a local Chrome/Chromium.
    pub fn new(credentials: Credentials, settings: FetchSettings) -> Self {
        let launcher = ChromiumLauncher::new(settings.launch.clone());
        Self::with_launcher(launcher, credentials, settings)
    }
}

impl<L: Launcher> ConsumptionFetcher<L> {
    pub fn with_launcher(launcher: L, credentials: Credentials, settings: FetchSettings) -> Self {
        Self {
            launcher,
            credentials,
            settings,
            session: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Logs in, walks to the consumption detail and extracts a snapshot.
    ///
    /// A snapshot with missing fields is still `Ok`; see
    /// [`ConsumptionSnapshot::check_complete`].
    pub async fn fetch(&self) -> Result<ConsumptionSnapshot, FetchError> {
        let mut slot = self.session.lock().await;
        let context = self.open_context(&mut slot).await?;
        let guard = ContextGuard::new(context);

        let result = match guard.page() {
            Some(page) => self.fetch_on(page).await,
            None => Err(unexpected("browser context")),
        };
        guard.close().await;

        match &result {
            Ok(snapshot) => {
                let missing = snapshot.missing_fields();
                if missing.is_empty() {
                    info!("Fetched consumption snapshot");
                } else {
                    warn!("Fetched partial snapshot, missing: {}", missing.join(", "));
                }
            }
            Err(err) => error!("Fetch failed ({}): {}", err.kind(), err),
        }
        result
    }

    /// Runs the login sequence alone.
    ///
    /// `Ok(false)` when the portal rejects the credentials; connectivity and
    /// other failures stay errors.
    pub async fn validate_credentials(&self) -> Result<bool, FetchError> {
        let mut slot = self.session.lock().await;
        let context = self.open_context(&mut slot).await?;
        let guard = ContextGuard::new(context);

        let result = match guard.page() {
            Some(page) => self.authenticate(page).await,
            None => Err(unexpected("browser context")),
        };
        guard.close().await;

        match result {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::AuthenticationFailed => {
                warn!("Credentials rejected: {}", err);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Shuts the browser down. Calling it again is a no-op.
    pub async fn close(&self) {
        let mut slot = self.session.lock().await;
        if let Some(mut session) = slot.take() {
            info!("Closing browser session");
            if let Err(e) = session.close().await {
                warn!("Browser close failed: {}", e);
            }
        }
    }

    async fn fetch_on(&self, page: &dyn PageDriver) -> Result<ConsumptionSnapshot, FetchError> {
        self.authenticate(page).await?;

        let label = self
            .credentials
            .service_id()
            .unwrap_or(&self.settings.default_service_label);
        let navigator = Navigator::new(
            page,
            &self.settings.urls,
            &self.settings.timeouts,
            label,
            self.settings.max_corrective_reloads,
        );
        navigator.open_consumption().await?;

        let today = self.settings.today();
        let fields = navigator.extract_with_recovery(today).await?;
        Ok(ConsumptionSnapshot::new(fields, Utc::now(), today))
    }

    /// Login with retry on connection timeouts only.
    async fn authenticate(&self, page: &dyn PageDriver) -> Result<(), FetchError> {
        let policy = &self.settings.auth_retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut auth = Authenticator::new(
                page,
                &self.credentials,
                &self.settings.urls,
                &self.settings.timeouts,
            );
            match auth.run().await {
                Ok(()) => return Ok(()),
                Err(err)
                    if err.kind() == ErrorKind::ConnectionTimeout
                        && attempt < policy.max_attempts =>
                {
                    warn!(
                        "Login timed out (attempt {}/{}), retrying in {:.1}s",
                        attempt,
                        policy.max_attempts,
                        policy.backoff.as_secs_f64()
                    );
                    sleep(policy.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn open_context(
        &self,
        slot: &mut Option<Box<dyn Session>>,
    ) -> Result<Box<dyn BrowserContext>, FetchError> {
        let alive = match slot.as_ref() {
            Some(session) => session.is_connected().await,
            None => false,
        };
        if !alive {
            if let Some(mut stale) = slot.take() {
                warn!("Browser session lost, relaunching");
                if let Err(e) = stale.close().await {
                    debug!("Closing stale session failed: {}", e);
                }
            }
            info!("Launching browser");
            let session = self
                .launcher
                .launch()
                .await
                .map_err(|e| FetchError::from_browser("browser launch", e))?;
            *slot = Some(session);
        }
        let session = slot.as_deref().ok_or_else(|| unexpected("browser launch"))?;
        session
            .new_context()
            .await
            .map_err(|e| FetchError::from_browser("browser context", e))
    }
}

fn unexpected(step: &str) -> FetchError {
    FetchError::UnexpectedFailure {
        step: step.to_string(),
        source: None,
    }
}

/// Disposes a browser context when the fetch ends.
///
/// The normal path awaits [`ContextGuard::close`]; if the fetch future is
/// dropped mid-flight instead, disposal is spawned onto the runtime.
struct ContextGuard {
    context: Option<Box<dyn BrowserContext>>,
}

impl ContextGuard {
    fn new(context: Box<dyn BrowserContext>) -> Self {
        Self {
            context: Some(context),
        }
    }

    fn page(&self) -> Option<&dyn PageDriver> {
        self.context.as_ref().map(|context| context.page())
    }

    async fn close(mut self) {
        if let Some(context) = self.context.take() {
            if let Err(e) = context.close().await {
                warn!("Browser context close failed: {}", e);
            }
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Fetch cancelled, disposing browser context in background");
                handle.spawn(async move {
                    if let Err(e) = context.close().await {
                        warn!("Browser context close failed: {}", e);
                    }
                });
            }
            Err(_) => warn!("No runtime to dispose browser context on"),
        }
    }
}
