//! Browser driver for the Mi Antel portal.
//!
//! Exposes a small async driver surface ([`PageDriver`], [`Session`],
//! [`Launcher`]) and a chromiumoxide implementation of it. Locators are
//! resolved inside the page so the same calls work in child frames.

pub mod chromium;
pub mod driver;
mod errors;
mod locator;
mod script;
mod user_agent;

pub use self::chromium::{ChromiumLauncher, LaunchConfig};
pub use self::driver::{
    BrowserContext, DocumentSnapshot, FrameSnapshot, Launcher, PageDriver, Session,
};
pub use self::errors::BrowserError;
pub use self::locator::{Frame, LoadState, Locator};
pub use self::user_agent::get_user_agent;
