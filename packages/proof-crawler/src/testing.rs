//! Testing utilities including a mock browser and page fixtures.
//!
//! These are useful for exercising the session, crawl and audit logic
//! without a WebDriver endpoint or a live platform.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::content::MemoryContentStore;
use crate::error::{BrowserError, BrowserResult, StorageError, StorageResult};
use crate::traits::browser::{BrowserLauncher, Key, PageClient};
use crate::traits::content::ContentStore;
use crate::types::cid::{Cid, NamedBlob};
use crate::types::config::PlatformConfig;

const BLANK_PAGE: &str = "<html><head></head><body></body></html>";

/// Record of a call made to a mock page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockPageCall {
    SetViewport { width: u32, height: u32 },
    Navigate { url: String },
    TypeText { selector: String, text: String },
    PressKey { key: Key },
    Close,
}

#[derive(Default)]
struct MockState {
    /// Rendered HTML by URL
    pages: RwLock<HashMap<String, String>>,

    /// Where a navigation actually lands, by requested URL
    redirects: RwLock<HashMap<String, String>>,

    /// URLs whose navigation fails
    fail_urls: RwLock<HashSet<String>>,

    /// Selectors the login form currently shows
    form_selectors: RwLock<HashSet<String>>,

    launches: AtomicUsize,
    closes: AtomicUsize,
    calls: RwLock<Vec<MockPageCall>>,
}

/// A mock browser that serves predefined HTML.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the crawler owns another.
#[derive(Clone)]
pub struct MockBrowser {
    state: Arc<MockState>,
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBrowser {
    /// Create a mock whose login form accepts any credentials.
    pub fn new() -> Self {
        Self::for_platform(&PlatformConfig::default())
    }

    /// Create a mock whose login form uses `platform`'s selectors.
    pub fn for_platform(platform: &PlatformConfig) -> Self {
        let state = MockState::default();
        {
            let mut form = state.form_selectors.write().unwrap();
            form.insert(platform.username_selector.clone());
            form.insert(platform.password_selector.clone());
        }
        Self {
            state: Arc::new(state),
        }
    }

    /// Remove the login form so every negotiation fails.
    pub fn without_login_form(self) -> Self {
        self.state.form_selectors.write().unwrap().clear();
        self
    }

    /// Show the username confirmation challenge during login.
    pub fn with_confirm_challenge(self) -> Self {
        let selector = PlatformConfig::default().confirm_selector;
        self.state.form_selectors.write().unwrap().insert(selector);
        self
    }

    /// Serve `html` at `url`.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.set_page(url, html);
        self
    }

    /// Land on `to` whenever `from` is requested.
    pub fn with_redirect(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.state
            .redirects
            .write()
            .unwrap()
            .insert(from.into(), to.into());
        self
    }

    /// Mark a URL as failing to load.
    pub fn fail_url(self, url: impl Into<String>) -> Self {
        self.state.fail_urls.write().unwrap().insert(url.into());
        self
    }

    /// Replace the HTML served at `url`.
    pub fn set_page(&self, url: impl Into<String>, html: impl Into<String>) {
        self.state
            .pages
            .write()
            .unwrap()
            .insert(url.into(), html.into());
    }

    /// Stop redirecting `from`.
    pub fn clear_redirect(&self, from: &str) {
        self.state.redirects.write().unwrap().remove(from);
    }

    /// Number of browsers launched.
    pub fn launch_count(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    /// Number of pages closed.
    pub fn closed_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// All calls made to pages of this browser.
    pub fn calls(&self) -> Vec<MockPageCall> {
        self.state.calls.read().unwrap().clone()
    }

    /// URLs navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockPageCall::Navigate { url } => Some(url),
                _ => None,
            })
            .collect()
    }

    /// `(selector, text)` pairs typed into inputs, in order.
    pub fn typed(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockPageCall::TypeText { selector, text } => Some((selector, text)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BrowserLauncher for MockBrowser {
    type Page = MockPage;

    async fn launch(&self) -> BrowserResult<MockPage> {
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        Ok(MockPage {
            state: self.state.clone(),
            current: RwLock::new("about:blank".to_string()),
            closed: AtomicBool::new(false),
        })
    }
}

/// The page handed out by [`MockBrowser`].
pub struct MockPage {
    state: Arc<MockState>,
    current: RwLock<String>,
    closed: AtomicBool,
}

impl Default for MockPage {
    fn default() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            current: RwLock::new("about:blank".to_string()),
            closed: AtomicBool::new(false),
        }
    }
}

impl MockPage {
    fn record(&self, call: MockPageCall) {
        self.state.calls.write().unwrap().push(call);
    }

    fn ensure_open(&self) -> BrowserResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }

    fn html(&self) -> String {
        let current = self.current.read().unwrap().clone();
        self.state
            .pages
            .read()
            .unwrap()
            .get(&current)
            .cloned()
            .unwrap_or_else(|| BLANK_PAGE.to_string())
    }
}

fn html_matches(html: &str, selector: &str) -> bool {
    match Selector::parse(selector) {
        Ok(selector) => Html::parse_document(html).select(&selector).next().is_some(),
        Err(_) => false,
    }
}

#[async_trait]
impl PageClient for MockPage {
    async fn set_viewport(&self, width: u32, height: u32) -> BrowserResult<()> {
        self.ensure_open()?;
        self.record(MockPageCall::SetViewport { width, height });
        Ok(())
    }

    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        self.record(MockPageCall::Navigate {
            url: url.to_string(),
        });

        if self.state.fail_urls.read().unwrap().contains(url) {
            return Err(BrowserError::Protocol(format!("mock navigation failure: {}", url)));
        }

        let landed = self
            .state
            .redirects
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        *self.current.write().unwrap() = landed;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        _timeout: std::time::Duration,
    ) -> BrowserResult<bool> {
        self.ensure_open()?;
        if self.state.form_selectors.read().unwrap().contains(selector) {
            return Ok(true);
        }
        Ok(html_matches(&self.html(), selector))
    }

    async fn wait_until_stable(&self, max_wait: std::time::Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        tokio::time::sleep(max_wait).await;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        self.record(MockPageCall::TypeText {
            selector: selector.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn press_key(&self, key: Key) -> BrowserResult<()> {
        self.ensure_open()?;
        self.record(MockPageCall::PressKey { key });
        Ok(())
    }

    async fn content(&self) -> BrowserResult<String> {
        self.ensure_open()?;
        Ok(self.html())
    }

    async fn current_url(&self) -> BrowserResult<String> {
        self.ensure_open()?;
        Ok(self.current.read().unwrap().clone())
    }

    async fn close(&self) -> BrowserResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
            self.record(MockPageCall::Close);
        }
        Ok(())
    }
}

/// A content store whose next writes can be made to fail.
///
/// Successful writes and all reads go to an inner [`MemoryContentStore`].
#[derive(Default)]
pub struct MockContentStore {
    inner: MemoryContentStore,
    fail_writes: AtomicUsize,
}

impl MockContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` writes with a storage API error.
    pub fn fail_next_writes(self, count: usize) -> Self {
        self.fail_writes.store(count, Ordering::SeqCst);
        self
    }

    /// The store that received the successful writes.
    pub fn inner(&self) -> &MemoryContentStore {
        &self.inner
    }
}

#[async_trait]
impl ContentStore for MockContentStore {
    async fn store(&self, blobs: Vec<NamedBlob>) -> StorageResult<Cid> {
        let rejected = self
            .fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(StorageError::Api {
                status: 503,
                message: "mock write failure".to_string(),
            });
        }
        self.inner.store(blobs).await
    }

    async fn fetch(&self, cid: &Cid, name: &str) -> StorageResult<Vec<u8>> {
        self.inner.fetch(cid, name).await
    }
}

/// HTML for a search or timeline page linking to `hrefs`.
pub fn listing_html(hrefs: &[&str]) -> String {
    let links: String = hrefs
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!("<html><body><main>{}</main></body></html>", links)
}

/// One rendered item, as the default platform selectors expect it.
#[derive(Debug, Clone)]
pub struct ItemFixture {
    pub author: String,
    pub text: String,
    pub counts: [String; 4],
}

impl ItemFixture {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            counts: ["0".into(), "0".into(), "0".into(), "0".into()],
        }
    }

    /// Set comment, like, share and view counters.
    pub fn with_counts(mut self, comments: &str, likes: &str, shares: &str, views: &str) -> Self {
        self.counts = [comments.into(), likes.into(), shares.into(), views.into()];
        self
    }

    fn to_html(&self) -> String {
        let counters: String = self
            .counts
            .iter()
            .map(|c| {
                format!(
                    r#"<span data-testid="app-text-transition-container">{}</span>"#,
                    c
                )
            })
            .collect();
        format!(
            r#"<article data-testid="tweet"><a tabindex="-1" href="/{a}">{a}</a><div data-testid="tweetText">{t}</div>{c}</article>"#,
            a = self.author,
            t = self.text,
            c = counters,
        )
    }
}

/// HTML for an item page: the primary item first, then its replies.
pub fn item_page_html(primary: &ItemFixture, replies: &[ItemFixture]) -> String {
    let mut body = primary.to_html();
    for reply in replies {
        body.push_str(&reply.to_html());
    }
    format!("<html><body><section>{}</section></body></html>", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_mock_serves_pages_and_redirects() {
        let browser = MockBrowser::new()
            .with_page("https://example.com/a", listing_html(&["/x/status/1"]))
            .with_redirect("https://example.com/b", "https://example.com/i/flow/login");
        let page = browser.launch().await.unwrap();

        page.navigate("https://example.com/a").await.unwrap();
        assert!(page.content().await.unwrap().contains("/x/status/1"));
        assert!(page
            .wait_for_selector("a[href]", Duration::from_secs(1))
            .await
            .unwrap());

        page.navigate("https://example.com/b").await.unwrap();
        assert_eq!(
            page.current_url().await.unwrap(),
            "https://example.com/i/flow/login"
        );
        assert_eq!(browser.navigations().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_mock_page_fails() {
        let browser = MockBrowser::new();
        let page = browser.launch().await.unwrap();
        page.close().await.unwrap();
        page.close().await.unwrap();

        assert!(matches!(page.content().await, Err(BrowserError::Closed)));
        assert_eq!(browser.closed_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_content_store_fails_then_recovers() {
        let content = MockContentStore::new().fail_next_writes(1);
        let blob = || vec![NamedBlob::json(&"gm").unwrap()];

        assert!(matches!(
            content.store(blob()).await,
            Err(StorageError::Api { status: 503, .. })
        ));
        let cid = content.store(blob()).await.unwrap();
        assert!(content.fetch(&cid, NamedBlob::JSON_NAME).await.is_ok());
        assert_eq!(content.inner().write_count(), 1);
    }

    #[test]
    fn test_item_fixture_html() {
        let html = item_page_html(
            &ItemFixture::new("alice", "hello").with_counts("1", "2", "3", "4"),
            &[ItemFixture::new("bob", "reply")],
        );
        assert_eq!(html.matches("data-testid=\"tweet\"").count(), 2);
        assert!(html.contains(">4</span>"));
    }
}
