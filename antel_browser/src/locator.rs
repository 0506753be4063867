//! Element locators, frame references and load conditions.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

/// How to find an element inside one document.
///
/// Locators are serialized to JSON and resolved by a script inside the page,
/// so every variant must be expressible with DOM APIs alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// Plain CSS selector.
    Css { selector: Cow<'static, str> },
    /// ARIA role with an optional case-insensitive pattern over the accessible name.
    Role {
        role: Cow<'static, str>,
        name: Option<Cow<'static, str>>,
    },
    /// Elements matching `selector` whose text contains `text` (case-insensitive).
    Text {
        selector: Cow<'static, str>,
        text: Cow<'static, str>,
    },
    /// First link inside the first `container` whose text contains `contains`.
    LinkIn {
        container: Cow<'static, str>,
        contains: Cow<'static, str>,
    },
}

impl Locator {
    pub const fn css(selector: &'static str) -> Self {
        Self::Css {
            selector: Cow::Borrowed(selector),
        }
    }

    pub const fn role(role: &'static str, name: &'static str) -> Self {
        Self::Role {
            role: Cow::Borrowed(role),
            name: Some(Cow::Borrowed(name)),
        }
    }

    pub const fn text(selector: &'static str, text: &'static str) -> Self {
        Self::Text {
            selector: Cow::Borrowed(selector),
            text: Cow::Borrowed(text),
        }
    }

    pub fn link_in(container: &'static str, contains: impl Into<String>) -> Self {
        Self::LinkIn {
            container: Cow::Borrowed(container),
            contains: Cow::Owned(contains.into()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css { selector } => write!(f, "css={}", selector),
            Self::Role { role, name: Some(name) } => write!(f, "role={}[name~/{}/]", role, name),
            Self::Role { role, name: None } => write!(f, "role={}", role),
            Self::Text { selector, text } => write!(f, "{}:has-text({:?})", selector, text),
            Self::LinkIn {
                container,
                contains,
            } => write!(f, "{}:has-text({:?}) a", container, contains),
        }
    }
}

/// A document inside the page: the top-level document or a child frame.
///
/// Child frames are numbered in document order, depth first, starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frame {
    Main,
    Child(usize),
}

impl Frame {
    /// The main document followed by `child_count` child frames.
    pub fn all(child_count: usize) -> impl Iterator<Item = Frame> {
        std::iter::once(Frame::Main).chain((0..child_count).map(Frame::Child))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Child(i) => write!(f, "frame#{}", i),
        }
    }
}

/// Condition a navigation waits for before it is considered done.
///
/// Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadState {
    /// The navigation was accepted by the browser.
    Commit,
    /// `DOMContentLoaded` fired (`readyState` left `loading`).
    DomContentLoaded,
    /// The `load` event fired (`readyState == complete`).
    Load,
    /// `load` fired and no new network resources appeared for a quiet period.
    NetworkIdle,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Commit => "commit",
            Self::DomContentLoaded => "domcontentloaded",
            Self::Load => "load",
            Self::NetworkIdle => "networkidle",
        };
        f.write_str(s)
    }
}
