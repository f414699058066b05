//! Background crawl lifecycle for a node.
//!
//! A [`CrawlTask`] runs at most one crawl at a time on the tokio runtime,
//! answers proof requests for the previous round, and audits other nodes'
//! proofs with a browser session of its own.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::audit::AuditVerdict;
use crate::crawler::{CrawlSummary, FrontierCrawler};
use crate::error::Result;
use crate::proof::ProofAggregator;
use crate::security::Credentials;
use crate::traits::{
    browser::BrowserLauncher, content::ContentStore, round::RoundProvider, store::CrawlStore,
};
use crate::types::cid::Cid;
use crate::types::config::{CrawlQuery, CrawlerConfig};

type Outcome<L, S, C> = (FrontierCrawler<L, S, C>, Result<CrawlSummary>);

struct RunningCrawl<L, S, C>
where
    L: BrowserLauncher,
    S: CrawlStore,
    C: ContentStore,
{
    handle: JoinHandle<Outcome<L, S, C>>,
    cancel: CancellationToken,
}

/// Owns the crawler, the proof aggregator and the auditor for one node.
pub struct CrawlTask<L, S, C>
where
    L: BrowserLauncher,
    S: CrawlStore,
    C: ContentStore,
{
    launcher: L,
    credentials: Credentials,
    config: CrawlerConfig,
    store: Arc<S>,
    content: Arc<C>,
    rounds: Arc<dyn RoundProvider>,
    aggregator: ProofAggregator<S, C>,
    idle: Option<FrontierCrawler<L, S, C>>,
    running: Option<RunningCrawl<L, S, C>>,
    auditor: Option<FrontierCrawler<L, S, C>>,
}

impl<L, S, C> CrawlTask<L, S, C>
where
    L: BrowserLauncher + Clone + 'static,
    S: CrawlStore + 'static,
    C: ContentStore + 'static,
{
    pub fn new(
        launcher: L,
        credentials: Credentials,
        store: Arc<S>,
        content: Arc<C>,
        rounds: Arc<dyn RoundProvider>,
        config: CrawlerConfig,
    ) -> Result<Self> {
        let aggregator = ProofAggregator::new(store.clone(), content.clone());
        let mut task = Self {
            launcher,
            credentials,
            config,
            store,
            content,
            rounds,
            aggregator,
            idle: None,
            running: None,
            auditor: None,
        };
        task.idle = Some(task.build_crawler()?);
        Ok(task)
    }

    fn build_crawler(&self) -> Result<FrontierCrawler<L, S, C>> {
        FrontierCrawler::new(
            self.launcher.clone(),
            self.credentials.clone(),
            self.store.clone(),
            self.content.clone(),
            self.rounds.clone(),
            self.config.clone(),
        )
    }

    /// Whether a crawl is in flight.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Spawn a crawl of `query` unless one is already in flight.
    ///
    /// Returns `false` when a crawl was already running.
    pub async fn start(&mut self, query: CrawlQuery) -> Result<bool> {
        if self
            .running
            .as_ref()
            .is_some_and(|running| running.handle.is_finished())
        {
            if let Some(Err(e)) = self.join().await {
                warn!(error = %e, "Previous crawl failed");
            }
        }

        if self.is_running() {
            info!("Crawl already in progress");
            return Ok(false);
        }

        let mut crawler = match self.idle.take() {
            Some(crawler) => crawler,
            None => self.build_crawler()?,
        };
        let cancel = CancellationToken::new();
        crawler.set_stop_handle(cancel.clone());

        info!(query = %query.query, "Spawning crawl");
        let handle = tokio::spawn(async move {
            let outcome = crawler.run(&query).await;
            (crawler, outcome)
        });

        self.running = Some(RunningCrawl { handle, cancel });
        Ok(true)
    }

    /// Ask the running crawl to stop. Does not wait for it.
    pub fn stop(&self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }

    /// Wait for the current crawl and return its outcome.
    ///
    /// `None` when nothing was started since the last join. Dropping the
    /// returned future leaves the crawl attached, so a later `stop` and
    /// `join` still reach it.
    pub async fn join(&mut self) -> Option<Result<CrawlSummary>> {
        let running = self.running.as_mut()?;
        let joined = (&mut running.handle).await;
        self.running = None;
        match joined {
            Ok((crawler, outcome)) => {
                self.idle = Some(crawler);
                Some(outcome)
            }
            Err(e) => {
                error!(error = %e, "Crawl task died");
                Some(Err(e.into()))
            }
        }
    }

    /// Proof CID for the round before the current one.
    pub async fn fetch_submission(&self) -> Result<Cid> {
        let round = self.rounds.current_round().await;
        self.aggregator.get_proof_cid(round.saturating_sub(1)).await
    }

    /// Audit another node's proof for `round`.
    pub async fn audit_submission(&mut self, cid: &Cid, round: u64) -> Result<AuditVerdict> {
        let auditor = match self.auditor.take() {
            Some(auditor) => auditor,
            None => self.build_crawler()?,
        };
        self.auditor.insert(auditor).validate_proof(cid, round).await
    }

    pub fn aggregator(&self) -> &ProofAggregator<S, C> {
        &self.aggregator
    }

    /// Stop any crawl and close every browser session.
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(Err(e)) = self.join().await {
            warn!(error = %e, "Crawl ended with error during shutdown");
        }
        if let Some(crawler) = self.idle.as_mut() {
            crawler.shutdown().await;
        }
        if let Some(auditor) = self.auditor.as_mut() {
            auditor.shutdown().await;
        }
    }
}
