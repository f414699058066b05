//! Session-Managed Proof Crawler
//!
//! Crawls a login-gated social platform through a rendered-page client,
//! anchors every harvested item in content-addressed storage, and rolls each
//! round's items up into a single verifiable proof.
//!
//! # Flow
//!
//! - A [`SessionManager`] keeps one logged-in browser page, renegotiating at
//!   most once per cooldown window
//! - A [`FrontierCrawler`] seeds a FIFO frontier from a search page, renders
//!   each permalink, persists the [`Record`] and stores its JSON blob
//! - Each stored blob's CID is recorded as an [`ItemCid`] for the round
//! - A [`ProofAggregator`] turns a round's ItemCids into one [`ProofCid`],
//!   created once and frozen
//! - Other nodes' proofs are checked with [`FrontierCrawler::validate_proof`]
//!
//! # Usage
//!
//! ```rust,ignore
//! use proof_crawler::{CrawlQuery, CrawlTask, Credentials, CrawlerConfig, FixedRound, MemoryStore};
//! use proof_crawler::{MemoryContentStore, WebDriverLauncher};
//! use std::sync::Arc;
//!
//! let mut task = CrawlTask::new(
//!     WebDriverLauncher::new("http://localhost:9515")?,
//!     Credentials::new("user", "password"),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryContentStore::new()),
//!     Arc::new(FixedRound::new(1)),
//!     CrawlerConfig::default(),
//! )?;
//!
//! task.start(CrawlQuery::new("https://twitter.com/search?q=rust", "rust").with_limit(10)).await?;
//! let summary = task.join().await;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Seams to the browser, stores and round source
//! - [`types`] - Records, CIDs and configuration
//! - [`session`] - Authenticated session lifecycle
//! - [`crawler`] - Frontier, link discovery and extraction
//! - [`proof`] - Per-round proof aggregation
//! - [`audit`] - Proof validation by re-rendering
//! - [`task`] - Background crawl lifecycle
//! - [`browser`] - WebDriver page client
//! - [`stores`] - Durable store implementations
//! - [`content`] - Content-addressed store implementations
//! - [`testing`] - Mock browser and page fixtures

pub mod audit;
pub mod browser;
pub mod content;
pub mod crawler;
pub mod error;
pub mod proof;
pub mod security;
pub mod session;
pub mod stores;
pub mod task;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{BrowserError, CrawlerError, SessionError, StorageError};
pub use traits::{
    browser::{BrowserLauncher, Key, PageClient},
    content::ContentStore,
    round::{ClockRounds, FixedRound, RoundProvider},
    store::{CrawlStore, ItemCidStore, ProofStore, RecordStore},
};
pub use types::{
    cid::{Cid, ItemCid, NamedBlob, ProofCid},
    config::{CrawlQuery, CrawlerConfig, PlatformConfig},
    record::{ItemBlob, ItemFields, Record},
};

pub use audit::AuditVerdict;
pub use crawler::{CrawlSummary, Frontier, FrontierCrawler, StopReason};
pub use proof::ProofAggregator;
pub use security::{Credentials, SecretString};
pub use session::{Session, SessionManager};
pub use task::CrawlTask;

// Re-export backends
pub use browser::{WebDriverLauncher, WebDriverPage};
pub use content::{MemoryContentStore, Web3StorageClient};
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

// Re-export testing utilities
pub use testing::{MockBrowser, MockContentStore, MockPage};
