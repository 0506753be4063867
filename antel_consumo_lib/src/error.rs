//! Classified errors for the consumption pipeline.

use std::fmt;

use antel_browser::BrowserError;

/// Fieldless error classification, for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthenticationFailed,
    ConnectionTimeout,
    NavigationFailed,
    ExtractionIncomplete,
    UnexpectedFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AuthenticationFailed => "authentication failed",
            Self::ConnectionTimeout => "connection timeout",
            Self::NavigationFailed => "navigation failed",
            Self::ExtractionIncomplete => "extraction incomplete",
            Self::UnexpectedFailure => "unexpected failure",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by [`crate::ConsumptionFetcher`].
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// Bad credentials or a login page that cannot be driven.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        reason: String,
        #[source]
        source: Option<BrowserError>,
    },
    /// The portal did not answer in time.
    #[error("connection timed out during {step}")]
    ConnectionTimeout {
        step: String,
        #[source]
        source: Option<BrowserError>,
    },
    /// Post-login pages were missing after every fallback route.
    #[error("navigation failed: {reason}")]
    NavigationFailed {
        reason: String,
        #[source]
        source: Option<BrowserError>,
    },
    /// A snapshot came back with headline fields absent.
    #[error("extraction incomplete: missing {}", missing.join(", "))]
    ExtractionIncomplete { missing: Vec<&'static str> },
    /// Anything not classified above.
    #[error("unexpected failure during {step}")]
    UnexpectedFailure {
        step: String,
        #[source]
        source: Option<BrowserError>,
    },
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            Self::ConnectionTimeout { .. } => ErrorKind::ConnectionTimeout,
            Self::NavigationFailed { .. } => ErrorKind::NavigationFailed,
            Self::ExtractionIncomplete { .. } => ErrorKind::ExtractionIncomplete,
            Self::UnexpectedFailure { .. } => ErrorKind::UnexpectedFailure,
        }
    }

    pub fn auth(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn navigation(reason: impl Into<String>) -> Self {
        Self::NavigationFailed {
            reason: reason.into(),
            source: None,
        }
    }

    /// Classifies a driver error raised during `step`: bounded waits that ran
    /// out are connectivity problems, everything else is unexpected.
    pub fn from_browser(step: impl Into<String>, err: BrowserError) -> Self {
        let step = step.into();
        if err.is_timeout() {
            Self::ConnectionTimeout {
                step,
                source: Some(err),
            }
        } else {
            Self::UnexpectedFailure {
                step,
                source: Some(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeouts_classify_as_connection_timeout() {
        let err = FetchError::from_browser(
            "login page",
            BrowserError::timeout("navigation", Duration::from_secs(60)),
        );
        assert_eq!(err.kind(), ErrorKind::ConnectionTimeout);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_other_driver_errors_are_unexpected() {
        let err = FetchError::from_browser("login page", BrowserError::Disconnected);
        assert_eq!(err.kind(), ErrorKind::UnexpectedFailure);
    }

    #[test]
    fn test_incomplete_lists_missing_fields() {
        let err = FetchError::ExtractionIncomplete {
            missing: vec!["used_data_gb", "plan_name"],
        };
        assert_eq!(
            err.to_string(),
            "extraction incomplete: missing used_data_gb, plan_name"
        );
    }
}
