//! Rendered-page client traits.
//!
//! A [`BrowserLauncher`] acquires a browser process and hands back one page
//! handle; the page drives navigation, waits, form input and HTML capture.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::BrowserResult;

/// Keys the login flow needs to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Escape,
}

impl Key {
    /// W3C WebDriver code point for the key.
    pub fn code_point(self) -> &'static str {
        match self {
            Key::Enter => "\u{E007}",
            Key::Tab => "\u{E004}",
            Key::Escape => "\u{E00C}",
        }
    }
}

/// Acquires a browser process and opens a page in it.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Page: PageClient;

    /// Launch (or attach to) a browser and open a fresh page.
    async fn launch(&self) -> BrowserResult<Self::Page>;
}

/// A single rendered page inside a launched browser.
#[async_trait]
pub trait PageClient: Send + Sync {
    async fn set_viewport(&self, width: u32, height: u32) -> BrowserResult<()>;

    /// Navigate and wait for the load event.
    async fn navigate(&self, url: &str) -> BrowserResult<()>;

    /// Wait until an element matching `selector` is present.
    ///
    /// Returns `Ok(false)` when `timeout` elapses first.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<bool>;

    /// Give client-side rendering up to `max_wait` to finish.
    async fn wait_until_stable(&self, max_wait: Duration) -> BrowserResult<()>;

    /// Type text into the first element matching `selector`.
    async fn type_text(&self, selector: &str, text: &str) -> BrowserResult<()>;

    async fn press_key(&self, key: Key) -> BrowserResult<()>;

    /// Rendered HTML of the current document.
    async fn content(&self) -> BrowserResult<String>;

    /// URL of the current document (after redirects).
    async fn current_url(&self) -> BrowserResult<String>;

    /// Close the page and release the browser process.
    async fn close(&self) -> BrowserResult<()>;
}
