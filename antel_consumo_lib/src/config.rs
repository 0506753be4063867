//! Credentials and tunables for the fetcher.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use antel_browser::LaunchConfig;
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use secrecy::{ExposeSecret, SecretString};

/// Portal account credentials. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
    service_id: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            service_id: None,
        }
    }

    /// Restricts card lookups to the service whose card mentions `service_id`.
    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        let service_id = service_id.into();
        self.service_id = (!service_id.trim().is_empty()).then_some(service_id);
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("service_id", &self.service_id)
            .finish()
    }
}

/// Portal addresses.
#[derive(Debug, Clone)]
pub struct PortalUrls {
    pub login: String,
    pub home: String,
    pub self_service: String,
    pub consumption: String,
}

impl Default for PortalUrls {
    fn default() -> Self {
        Self {
            login: "https://www.antel.com.uy/acceder/-/login/openid_connect_request\
                    ?p_p_state=maximized\
                    &_com_liferay_login_web_portlet_LoginPortlet_saveLastPath=false\
                    &_com_liferay_login_web_portlet_LoginPortlet_redirect=/\
                    &_com_liferay_login_web_portlet_LoginPortlet_OPEN_ID_CONNECT_PROVIDER_NAME=TuID"
                .to_string(),
            home: "https://www.antel.com.uy/".to_string(),
            self_service: "https://aplicaciones.antel.com.uy/dashboard/inicio".to_string(),
            consumption: "https://aplicaciones.antel.com.uy/miAntel/consumo/internet".to_string(),
        }
    }
}

/// Bounded waits used throughout a fetch.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Loading a page up to DOMContentLoaded.
    pub navigation: Duration,
    /// Extra time allowed for the network to go idle after a load.
    pub settle: Duration,
    /// Waiting for a login form element.
    pub element: Duration,
    /// Overall budget for the password field to show up in any frame.
    pub password_field: Duration,
    /// Interval between password-field probes.
    pub password_poll: Duration,
    /// Waiting for consumption data markers on the detail page.
    pub data_markers: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            settle: Duration::from_secs(30),
            element: Duration::from_secs(30),
            password_field: Duration::from_secs(30),
            password_poll: Duration::from_millis(500),
            data_markers: Duration::from_secs(20),
        }
    }
}

/// Retry policy for the authentication sequence.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: usize,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(30),
        }
    }
}

/// Everything the fetcher needs besides credentials.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub urls: PortalUrls,
    pub timeouts: Timeouts,
    pub auth_retry: RetryPolicy,
    pub launch: LaunchConfig,
    /// Zone used to decide what "today" is for dates printed without a year.
    pub timezone: FixedOffset,
    /// Card filter used when the credentials carry no service id.
    pub default_service_label: String,
    /// Upper bound on corrective reloads after a service-error page.
    pub max_corrective_reloads: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            urls: PortalUrls::default(),
            timeouts: Timeouts::default(),
            auth_retry: RetryPolicy::default(),
            launch: LaunchConfig::default(),
            timezone: uruguay_offset(),
            default_service_label: "Fibra".to_string(),
            max_corrective_reloads: 2,
        }
    }
}

impl FetchSettings {
    /// Defaults overridden by `ANTEL_*` environment variables.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        let retry = &mut settings.auth_retry;
        retry.max_attempts = env_usize("ANTEL_AUTH_MAX_ATTEMPTS", retry.max_attempts).max(1);
        retry.backoff = Duration::from_secs(env_u64(
            "ANTEL_AUTH_BACKOFF_SECS",
            retry.backoff.as_secs(),
        ));

        let timeouts = &mut settings.timeouts;
        timeouts.navigation = Duration::from_secs(env_u64(
            "ANTEL_NAV_TIMEOUT_SECS",
            timeouts.navigation.as_secs(),
        ));
        timeouts.password_field = Duration::from_secs(env_u64(
            "ANTEL_PASSWORD_WAIT_SECS",
            timeouts.password_field.as_secs(),
        ));

        if let Ok(val) = std::env::var("ANTEL_HEADLESS") {
            settings.launch.headless = !matches!(val.to_ascii_lowercase().as_str(), "0" | "false" | "no");
        }
        if let Ok(path) = std::env::var("ANTEL_CHROME_PATH") {
            if !path.is_empty() {
                settings.launch.chrome_executable = Some(PathBuf::from(path));
            }
        }
        if let Some(offset) = std::env::var("ANTEL_UTC_OFFSET_HOURS")
            .ok()
            .and_then(|val| val.parse::<i32>().ok())
            .and_then(|hours| FixedOffset::east_opt(hours * 3600))
        {
            settings.timezone = offset;
        }
        settings
    }

    /// Current calendar date in the configured zone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

fn uruguay_offset() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap_or_else(|| Utc.fix())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("user@example.com", "hunter2");
        let out = format!("{:?}", creds);
        assert!(out.contains("user@example.com"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn test_blank_service_id_is_ignored() {
        let creds = Credentials::new("u", "p").with_service_id("  ");
        assert_eq!(creds.service_id(), None);
        let creds = Credentials::new("u", "p").with_service_id("ZU3367");
        assert_eq!(creds.service_id(), Some("ZU3367"));
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_secs(30));
    }

    #[test]
    fn test_default_timezone_is_uruguay() {
        assert_eq!(FetchSettings::default().timezone.local_minus_utc(), -3 * 3600);
    }
}
