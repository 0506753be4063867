//! Error types for the browser driver.

use std::time::Duration;

/// Errors that can occur while driving a browser page.
#[derive(thiserror::Error, Debug)]
pub enum BrowserError {
    /// A bounded wait elapsed before the page reached the requested state.
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },
    /// The browser process could not be started or configured.
    #[error("failed to launch browser: {0}")]
    Launch(String),
    /// The connection to the browser is gone.
    #[error("browser connection closed")]
    Disconnected,
    /// A DevTools protocol command failed.
    #[error("devtools protocol error: {0}")]
    Protocol(String),
    /// A script evaluated in the page threw or returned an unexpected shape.
    #[error("script error: {0}")]
    Script(String),
    /// The requested frame does not exist (anymore).
    #[error("frame {0} is not attached")]
    FrameDetached(usize),
}

impl BrowserError {
    pub fn timeout(what: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            waited,
        }
    }

    /// True for errors caused by a bounded wait running out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match e {
            CdpError::Timeout => Self::Timeout {
                what: "devtools response".to_string(),
                waited: Duration::ZERO,
            },
            CdpError::ChannelSendError(_) => Self::Disconnected,
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for BrowserError {
    fn from(e: serde_json::Error) -> Self {
        Self::Script(format!("unexpected script result: {}", e))
    }
}
