//! Configuration types for sessions, crawling and auditing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-invocation crawl parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlQuery {
    /// Seed URL the frontier is built from (usually a search page)
    pub query: String,

    /// Search term combined with reply authors during recursive expansion
    pub search_term: String,

    /// Expand reply authors into new searches during extraction
    #[serde(default)]
    pub is_recursive: bool,

    /// Discover further links from every visited item page
    #[serde(default)]
    pub recursive: bool,

    /// Number of successfully stored records to collect
    pub limit: usize,
}

impl CrawlQuery {
    /// Create a query for a seed URL and search term.
    pub fn new(query: impl Into<String>, search_term: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            search_term: search_term.into(),
            is_recursive: false,
            recursive: false,
            limit: 100,
        }
    }

    /// Set the record limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Expand reply authors into new searches.
    pub fn with_reply_expansion(mut self, enabled: bool) -> Self {
        self.is_recursive = enabled;
        self
    }

    /// Follow links found on visited item pages.
    pub fn with_link_following(mut self, enabled: bool) -> Self {
        self.recursive = enabled;
        self
    }
}

/// Where the platform lives and how its pages are laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Platform home, visited first during login
    pub home_url: String,

    /// Entry point of the login flow
    pub login_url: String,

    /// Path fragment that marks a bounce into the login flow
    pub login_marker: String,

    /// Search endpoint used for reply expansion
    pub search_url: String,

    pub username_selector: String,

    /// Optional "confirm your username" challenge input
    pub confirm_selector: String,

    pub password_selector: String,

    /// One harvestable item on a rendered page
    pub item_selector: String,

    pub text_selector: String,

    pub author_selector: String,

    /// Engagement counters inside an item, in page order
    pub counter_selector: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            home_url: "https://twitter.com".to_string(),
            login_url: "https://twitter.com/i/flow/login".to_string(),
            login_marker: "/i/flow/login".to_string(),
            search_url: "https://twitter.com/search".to_string(),
            username_selector: r#"input[autocomplete="username"]"#.to_string(),
            confirm_selector: r#"input[data-testid="ocfEnterTextTextInput"]"#.to_string(),
            password_selector: r#"input[name="password"]"#.to_string(),
            item_selector: r#"article[data-testid="tweet"]"#.to_string(),
            text_selector: r#"div[data-testid="tweetText"]"#.to_string(),
            author_selector: r#"a[tabindex="-1"]"#.to_string(),
            counter_selector: r#"span[data-testid="app-text-transition-container"]"#
                .to_string(),
        }
    }
}

impl PlatformConfig {
    /// Point every platform URL at another origin (e.g. a test server).
    pub fn with_origin(mut self, origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        self.home_url = origin.to_string();
        self.login_url = format!("{}{}", origin, self.login_marker);
        self.search_url = format!("{}/search", origin);
        self
    }
}

/// Crawler configuration: bounded waits, viewport and session policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub platform: PlatformConfig,

    /// Viewport width for every page
    pub viewport_width: u32,

    /// Viewport height while logging in
    pub login_viewport_height: u32,

    /// Extended viewport height that forces lazy content to mount
    pub crawl_viewport_height: u32,

    /// Pause before navigating to a discovery seed. Default: 1s.
    pub pre_navigation_delay: Duration,

    /// Settle time after loading a discovery seed. Default: 5s.
    pub discovery_settle: Duration,

    /// Settle time after loading an item page. Default: 2s.
    pub extraction_settle: Duration,

    /// How long to wait for a required login input. Default: 30s.
    pub element_wait: Duration,

    /// How long to wait for the optional confirmation challenge. Default: 5s.
    pub confirm_wait: Duration,

    /// Settle time after submitting the password. Default: 1s.
    pub login_settle: Duration,

    /// Minimum spacing between negotiation attempts. Default: 60s.
    pub session_cooldown: Duration,

    /// Consecutive failed negotiations before giving up. Default: 3.
    pub max_retry: u32,

    /// Items re-rendered per audited proof. Default: 5.
    pub audit_sample: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig::default(),
            viewport_width: 1920,
            login_viewport_height: 1000,
            crawl_viewport_height: 10_000,
            pre_navigation_delay: Duration::from_secs(1),
            discovery_settle: Duration::from_secs(5),
            extraction_settle: Duration::from_secs(2),
            element_wait: Duration::from_secs(30),
            confirm_wait: Duration::from_secs(5),
            login_settle: Duration::from_secs(1),
            session_cooldown: Duration::from_secs(60),
            max_retry: 3,
            audit_sample: 5,
        }
    }
}

impl CrawlerConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the platform description.
    pub fn with_platform(mut self, platform: PlatformConfig) -> Self {
        self.platform = platform;
        self
    }

    /// Set the session cooldown.
    pub fn with_session_cooldown(mut self, cooldown: Duration) -> Self {
        self.session_cooldown = cooldown;
        self
    }

    /// Set the login retry budget.
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Set the audit sample size.
    pub fn with_audit_sample(mut self, sample: usize) -> Self {
        self.audit_sample = sample;
        self
    }

    /// Zero every settle delay. Bounded element waits are left as they are.
    pub fn without_settle_delays(mut self) -> Self {
        self.pre_navigation_delay = Duration::ZERO;
        self.discovery_settle = Duration::ZERO;
        self.extraction_settle = Duration::ZERO;
        self.login_settle = Duration::ZERO;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_waits() {
        let config = CrawlerConfig::default();
        assert_eq!(config.pre_navigation_delay, Duration::from_secs(1));
        assert_eq!(config.extraction_settle, Duration::from_secs(2));
        assert_eq!(config.discovery_settle, Duration::from_secs(5));
        assert_eq!(config.confirm_wait, Duration::from_secs(5));
        assert_eq!(config.session_cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_with_origin_rewrites_urls() {
        let platform = PlatformConfig::default().with_origin("https://example.com/");
        assert_eq!(platform.home_url, "https://example.com");
        assert_eq!(platform.login_url, "https://example.com/i/flow/login");
        assert_eq!(platform.search_url, "https://example.com/search");
    }

    #[test]
    fn test_query_builder() {
        let query = CrawlQuery::new("https://example.com/search?q=rust", "rust")
            .with_limit(5)
            .with_reply_expansion(true);
        assert_eq!(query.limit, 5);
        assert!(query.is_recursive);
        assert!(!query.recursive);
    }
}
