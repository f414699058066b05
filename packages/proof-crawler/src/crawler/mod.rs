//! Frontier crawler: discover item permalinks, render each one, anchor the
//! extracted record in content-addressed storage.
//!
//! One crawler owns one browser session and one frontier. Every method that
//! touches either takes `&mut self`, so there is exactly one navigation in
//! flight per crawler.

pub mod extract;
pub mod frontier;
pub mod links;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{CrawlerError, Result, SessionError};
use crate::security::Credentials;
use crate::session::SessionManager;
use crate::traits::{
    browser::{BrowserLauncher, PageClient},
    content::ContentStore,
    round::RoundProvider,
    store::CrawlStore,
};
use crate::types::{
    cid::ItemCid,
    config::{CrawlQuery, CrawlerConfig},
    record::Record,
};

pub use extract::{parse_item_page, reply_search_url, PageSelectors, ParsedPage};
pub use frontier::Frontier;
pub use links::{extract_permalinks, is_permalink};

/// Why a crawl run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `limit` items were harvested
    LimitReached,
    /// A stop was requested
    Stopped,
    /// Nothing was left to visit
    FrontierExhausted,
}

/// Outcome of [`FrontierCrawler::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Items persisted and anchored during the run
    pub parsed: usize,

    /// URLs still queued when the run ended
    pub remaining: usize,

    pub reason: StopReason,
}

/// Crawls one query with one authenticated browser session.
pub struct FrontierCrawler<L, S, C>
where
    L: BrowserLauncher,
    S: CrawlStore,
    C: ContentStore,
{
    config: CrawlerConfig,
    selectors: PageSelectors,
    session: SessionManager<L>,
    frontier: Frontier,
    store: Arc<S>,
    content: Arc<C>,
    rounds: Arc<dyn RoundProvider>,
    cancel: CancellationToken,
}

impl<L, S, C> FrontierCrawler<L, S, C>
where
    L: BrowserLauncher,
    S: CrawlStore,
    C: ContentStore,
{
    /// Create a crawler. Fails if a configured selector does not parse.
    pub fn new(
        launcher: L,
        credentials: Credentials,
        store: Arc<S>,
        content: Arc<C>,
        rounds: Arc<dyn RoundProvider>,
        config: CrawlerConfig,
    ) -> Result<Self> {
        let selectors = PageSelectors::compile(&config.platform)?;
        Ok(Self {
            session: SessionManager::new(launcher, credentials, config.clone()),
            config,
            selectors,
            frontier: Frontier::new(),
            store,
            content,
            rounds,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// URLs waiting to be visited.
    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn session(&self) -> &SessionManager<L> {
        &self.session
    }

    pub(crate) fn content(&self) -> &Arc<C> {
        &self.content
    }

    /// Request the current run to end at the next iteration boundary.
    pub fn stop(&self) {
        info!("Crawl stop requested");
        self.cancel.cancel();
    }

    /// Token that stops this crawler when cancelled from elsewhere.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Replace the stop token, e.g. to run again after a stop.
    pub fn set_stop_handle(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// Close the browser session.
    pub async fn shutdown(&mut self) {
        self.session.close().await;
    }

    /// Collect item permalinks from a listing page (search, timeline, item).
    pub async fn discover_links(&mut self, seed_url: &str) -> Result<Vec<String>> {
        let base = Url::parse(seed_url).map_err(|_| CrawlerError::InvalidUrl {
            url: seed_url.to_string(),
        })?;

        tokio::time::sleep(self.config.pre_navigation_delay).await;

        let (html, landed) = {
            let page = self.session.ensure_session().await?;
            page.set_viewport(self.config.viewport_width, self.config.crawl_viewport_height)
                .await?;
            page.navigate(seed_url).await?;
            page.wait_until_stable(self.config.discovery_settle).await?;
            (page.content().await?, page.current_url().await?)
        };
        self.check_landing(seed_url, &landed)?;

        let links = extract_permalinks(&html, &base);
        debug!(seed = %seed_url, count = links.len(), "Discovered links");
        Ok(links)
    }

    /// Render `url` and extract its primary item for the current round.
    ///
    /// With `query.is_recursive`, authors of the replies on the page are
    /// searched for `query.search_term` and the hits join the frontier.
    pub async fn extract_record(&mut self, url: &str, query: Option<&CrawlQuery>) -> Result<Record> {
        let round = self.rounds.current_round().await;
        self.extract_at(url, query, round).await
    }

    pub(crate) async fn extract_at(
        &mut self,
        url: &str,
        query: Option<&CrawlQuery>,
        round: u64,
    ) -> Result<Record> {
        let (html, landed) = {
            let page = self.session.ensure_session().await?;
            page.set_viewport(self.config.viewport_width, self.config.crawl_viewport_height)
                .await?;
            page.navigate(url).await?;
            page.wait_until_stable(self.config.extraction_settle).await?;
            (page.content().await?, page.current_url().await?)
        };

        self.check_landing(url, &landed)?;

        let parsed = parse_item_page(&html, &self.selectors);

        if let Some(query) = query.filter(|q| q.is_recursive) {
            self.expand_replies(&parsed.reply_authors, &query.search_term)
                .await;
        }

        Ok(match parsed.primary {
            Some(fields) => Record::new(url, round, fields),
            None => Record::empty(url, round),
        })
    }

    /// A navigation that lands on the login flow means the session expired.
    fn check_landing(&mut self, url: &str, landed: &str) -> Result<()> {
        if landed.contains(&self.config.platform.login_marker) {
            warn!(url = %url, landed = %landed, "Redirected to login");
            self.session.invalidate();
            return Err(SessionError::Expired {
                url: url.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn expand_replies(&mut self, authors: &[String], term: &str) {
        for author in authors {
            let search = reply_search_url(&self.config.platform.search_url, author, term);
            match self.discover_links(&search).await {
                Ok(links) => {
                    let added = self.frontier.extend(links);
                    debug!(author = %author, added, "Queued reply search results");
                }
                Err(e) => warn!(author = %author, error = %e, "Reply search failed"),
            }
        }
    }

    /// Crawl `query` until `limit` items are harvested, the frontier runs dry,
    /// or a stop is requested.
    pub async fn run(&mut self, query: &CrawlQuery) -> Result<CrawlSummary> {
        info!(query = %query.query, limit = query.limit, "Starting crawl");

        self.frontier.clear();
        let seeds = loop {
            match self.discover_links(&query.query).await {
                Ok(links) => break links,
                Err(CrawlerError::Session(e)) => self.recover(e).await?,
                Err(e) => return Err(e),
            }
            if self.cancel.is_cancelled() {
                info!("Crawl stopped before seeding");
                return Ok(CrawlSummary {
                    parsed: 0,
                    remaining: 0,
                    reason: StopReason::Stopped,
                });
            }
        };
        self.frontier.extend(seeds);

        let mut parsed = 0;
        let reason = loop {
            if parsed >= query.limit {
                break StopReason::LimitReached;
            }
            if self.cancel.is_cancelled() {
                break StopReason::Stopped;
            }

            let status = self.session.ensure_session().await.map(|_| ());
            if let Err(e) = status {
                self.recover(e).await?;
                continue;
            }

            let round = self.rounds.update_round().await;
            let Some(url) = self.frontier.pop() else {
                break StopReason::FrontierExhausted;
            };

            match self.harvest(&url, query, round).await {
                Ok(true) => parsed += 1,
                Ok(false) => {
                    debug!(url = %url, "Nothing usable on page");
                }
                Err(CrawlerError::Session(e)) if !e.is_recoverable() => return Err(e.into()),
                Err(CrawlerError::Session(e)) => {
                    warn!(url = %url, error = %e, "Session lost, will retry item");
                    self.frontier.requeue(url);
                    continue;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Skipping item");
                    continue;
                }
            }

            if query.recursive {
                match self.discover_links(&url).await {
                    Ok(links) => {
                        let added = self.frontier.extend(links);
                        debug!(url = %url, added, "Followed links");
                    }
                    Err(e) => warn!(url = %url, error = %e, "Link discovery failed"),
                }
            }
        };

        let summary = CrawlSummary {
            parsed,
            remaining: self.frontier.len(),
            reason,
        };
        info!(
            parsed = summary.parsed,
            remaining = summary.remaining,
            reason = ?summary.reason,
            "Crawl finished"
        );
        Ok(summary)
    }

    /// Wait out a session failure. Only an exhausted retry budget is fatal.
    async fn recover(&mut self, err: SessionError) -> Result<()> {
        match err {
            SessionError::NotYetUsable { retry_in } => {
                debug!(?retry_in, "Waiting for session");
                tokio::select! {
                    _ = tokio::time::sleep(retry_in) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
            e if e.is_recoverable() => warn!(error = %e, "Session unavailable"),
            e => return Err(e.into()),
        }
        Ok(())
    }

    /// Extract, persist and anchor one item. Returns whether it counted.
    async fn harvest(&mut self, url: &str, query: &CrawlQuery, round: u64) -> Result<bool> {
        let record = self.extract_at(url, Some(query), round).await?;
        let Some(blob) = record.to_blob() else {
            return Ok(false);
        };

        self.store.put_record(&record).await?;
        let cid = self.content.store_json(&blob).await?;
        self.store
            .put_item_cid(&ItemCid::new(url, round, cid.clone()))
            .await?;

        info!(url = %url, round, cid = %cid, "Stored item");
        Ok(true)
    }
}
