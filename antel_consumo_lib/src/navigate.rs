//! Post-login navigation to the consumption detail page, plus the corrective
//! cascade run when the portal answers with a service-error page.

use antel_browser::{BrowserError, DocumentSnapshot, Frame, LoadState, Locator, PageDriver};
use chrono::NaiveDate;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{PortalUrls, Timeouts};
use crate::error::FetchError;
use crate::extract::extract_consumption;
use crate::snapshot::CapturedFields;

const ACCOUNT_MENU: &[Locator] = &[
    Locator::role("button", "mi cuenta|mi perfil|usuario"),
    Locator::css("[class*=\"user-menu\"], [class*=\"usuario\"] .dropdown-toggle"),
];

const SELF_SERVICE_LINKS: &[Locator] = &[
    Locator::role("link", "mi antel|autogesti"),
    Locator::css("a[href*=\"miAntel\"], a[href*=\"dashboard\"]"),
];

const DETAIL_LINKS: &[Locator] = &[
    Locator::role("link", "detalle"),
    Locator::text("a", "detalle"),
];

const DATA_MARKERS: &[Locator] = &[
    Locator::css(".progress-bar__label"),
    Locator::css(".value-data"),
    Locator::text("p, span, div", "Me quedan"),
];

/// Containers that hold one service card each on the dashboard.
const SERVICE_CARDS: &str = ".servicioBox, .card, [class*=\"servicio\"]";

/// Phrases the portal shows instead of consumption data when its backend
/// for the service is down. Matched lowercase.
const SERVICE_ERROR_MARKERS: &[&str] = &[
    "servicio no disponible",
    "no pudimos obtener",
    "ocurrió un error",
    "ocurrio un error",
    "intente nuevamente",
    "inténtelo más tarde",
];

const MARKER_POLL: std::time::Duration = std::time::Duration::from_millis(500);

/// Whether any captured document shows a service-error phrase.
pub fn has_service_error(document: &DocumentSnapshot) -> bool {
    document.documents().any(|doc| {
        let text = doc.body_text.to_lowercase();
        SERVICE_ERROR_MARKERS.iter().any(|marker| text.contains(marker))
    })
}

/// Walks an authenticated page to the consumption detail.
pub struct Navigator<'a> {
    page: &'a dyn PageDriver,
    urls: &'a PortalUrls,
    timeouts: &'a Timeouts,
    service_label: &'a str,
    max_corrective_reloads: usize,
}

impl<'a> Navigator<'a> {
    pub fn new(
        page: &'a dyn PageDriver,
        urls: &'a PortalUrls,
        timeouts: &'a Timeouts,
        service_label: &'a str,
        max_corrective_reloads: usize,
    ) -> Self {
        Self {
            page,
            urls,
            timeouts,
            service_label,
            max_corrective_reloads,
        }
    }

    /// home → account menu → self-service → consumption detail.
    ///
    /// A missing menu or self-service link falls back to visiting the URL
    /// directly. If the detail page shows no data markers, the dashboard's
    /// "detalle" link is tried once before giving up.
    pub async fn open_consumption(&self) -> Result<(), FetchError> {
        self.goto_settled(&self.urls.home, "home").await?;

        let mut menu_opened = false;
        for locator in ACCOUNT_MENU {
            if self.page.click(Frame::Main, locator).await.unwrap_or(false) {
                debug!("Opened account menu via {}", locator);
                menu_opened = true;
                break;
            }
        }
        if !menu_opened {
            debug!("No account menu on home page");
        }

        match self.find_link(SELF_SERVICE_LINKS).await {
            Some(href) => self.goto_settled(&href, "self-service").await?,
            None => {
                debug!("No self-service link, visiting {}", self.urls.self_service);
                self.goto_settled(&self.urls.self_service, "self-service")
                    .await?
            }
        }

        self.goto_settled(&self.urls.consumption, "consumption detail")
            .await?;
        if self.wait_for_markers().await? {
            info!("Consumption detail loaded");
            return Ok(());
        }

        warn!("No consumption data on detail page, trying the dashboard detail link");
        self.goto_settled(&self.urls.self_service, "self-service")
            .await?;
        let Some(href) = self.find_link(DETAIL_LINKS).await else {
            return Err(FetchError::navigation(
                "consumption detail shows no data and no alternate route exists",
            ));
        };
        self.goto_settled(&href, "consumption detail (alternate)")
            .await?;
        if self.wait_for_markers().await? {
            info!("Consumption detail loaded through alternate route");
            Ok(())
        } else {
            Err(FetchError::navigation(
                "consumption detail shows no data after every route",
            ))
        }
    }

    /// Captures and extracts the current page, running the corrective
    /// cascade when the portal shows a service-error page.
    ///
    /// The first correction reloads the detail URL. If that still yields no
    /// quantities, the service card matching the configured label is followed
    /// from the dashboard. Whatever the last capture produced is returned,
    /// partial or not.
    ///
    /// The card search starts on the self-service dashboard rather than the
    /// home page, since the home page carries no per-service cards.
    pub async fn extract_with_recovery(&self, today: NaiveDate) -> Result<CapturedFields, FetchError> {
        let (document, mut fields) = self.capture(today).await?;
        let mut reloads = 0;

        if reloads < self.max_corrective_reloads && has_service_error(&document) {
            warn!("Service error page detected, reloading consumption detail");
            self.goto_settled(&self.urls.consumption, "consumption detail (reload)")
                .await?;
            reloads += 1;
            (_, fields) = self.capture(today).await?;
        }

        if reloads > 0 && reloads < self.max_corrective_reloads && !fields.has_quantities() {
            warn!(
                "Still no consumption data, following the {:?} service card",
                self.service_label
            );
            self.goto_settled(&self.urls.self_service, "self-service")
                .await?;
            let card = Locator::link_in(SERVICE_CARDS, self.service_label);
            match self.page.link_target(Frame::Main, &card).await {
                Ok(Some(href)) => {
                    let href = self.absolute(href).await;
                    self.goto_settled(&href, "service card").await?;
                    reloads += 1;
                    (_, fields) = self.capture(today).await?;
                }
                Ok(None) => warn!("No service card matches {:?}", self.service_label),
                Err(e) => warn!("Service card lookup failed: {}", e),
            }
        }

        if reloads > 0 {
            info!(
                "Corrective reloads: {}, quantities found: {}",
                reloads,
                fields.has_quantities()
            );
        }
        Ok(fields)
    }

    async fn capture(&self, today: NaiveDate) -> Result<(DocumentSnapshot, CapturedFields), FetchError> {
        let document = self
            .page
            .snapshot()
            .await
            .map_err(|e| FetchError::from_browser("page capture", e))?;
        let fields = extract_consumption(&document, today);
        Ok((document, fields))
    }

    /// Navigates to `url`, then settles on the strongest load condition the
    /// page reaches in time: network idle, else DOM content loaded, else the
    /// committed navigation alone.
    async fn goto_settled(&self, url: &str, what: &str) -> Result<(), FetchError> {
        debug!("Navigating to {} ({})", what, url);
        self.page
            .goto(url, LoadState::Commit, self.timeouts.navigation)
            .await
            .map_err(|e| FetchError::from_browser(what, e))?;

        for until in [LoadState::NetworkIdle, LoadState::DomContentLoaded] {
            match self
                .page
                .wait_for_load_state(until, self.timeouts.settle)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if e.is_timeout() => debug!("{} did not reach {}", what, until),
                Err(e) => return Err(FetchError::from_browser(what, e)),
            }
        }
        warn!("{} never settled, continuing after commit", what);
        Ok(())
    }

    async fn find_link(&self, locators: &[Locator]) -> Option<String> {
        for locator in locators {
            match self.page.link_target(Frame::Main, locator).await {
                Ok(Some(href)) if !href.is_empty() => return Some(self.absolute(href).await),
                Ok(_) => {}
                Err(e) => debug!("Link lookup {} failed: {}", locator, e),
            }
        }
        None
    }

    /// Resolves a possibly relative link against the current page.
    async fn absolute(&self, href: String) -> String {
        if Url::parse(&href).is_ok() {
            return href;
        }
        let base = match self.page.current_url().await {
            Ok(current) => current,
            Err(_) => self.urls.self_service.clone(),
        };
        match Url::parse(&base).and_then(|base| base.join(&href)) {
            Ok(url) => url.to_string(),
            Err(_) => href,
        }
    }

    /// Waits for consumption markers in any document. `Ok(false)` on timeout.
    async fn wait_for_markers(&self) -> Result<bool, FetchError> {
        let poll = async {
            loop {
                let frames = self.page.frame_count().await.unwrap_or(0);
                for frame in Frame::all(frames) {
                    for marker in DATA_MARKERS {
                        match self.page.is_visible(frame, marker).await {
                            Ok(true) => return Ok::<_, BrowserError>(()),
                            Ok(false) => {}
                            Err(BrowserError::Disconnected) => {
                                return Err(BrowserError::Disconnected)
                            }
                            Err(e) => debug!("Marker probe failed: {}", e),
                        }
                    }
                }
                sleep(MARKER_POLL).await;
            }
        };
        match timeout(self.timeouts.data_markers, poll).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(FetchError::from_browser("consumption markers", e)),
            Err(_) => Ok(false),
        }
    }
}
