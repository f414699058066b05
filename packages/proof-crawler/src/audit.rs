//! Auditing another node's proof by re-rendering a sample of its items.

use tracing::{info, warn};

use crate::crawler::FrontierCrawler;
use crate::error::{Result, StorageError};
use crate::traits::{browser::BrowserLauncher, content::ContentStore, store::CrawlStore};
use crate::types::cid::{Cid, ItemCid};
use crate::types::record::ItemBlob;

/// Result of auditing a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditVerdict {
    /// Every sampled item still renders as claimed
    Valid { checked: usize },
    /// The proof is malformed or an item does not hold up
    Invalid { reason: String },
}

impl AuditVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, AuditVerdict::Valid { .. })
    }

    fn invalid(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(reason = %reason, "Proof rejected");
        AuditVerdict::Invalid { reason }
    }
}

/// Fetch and decode a JSON blob, treating undecodable content as a bad proof.
async fn fetch_decoded<C, T>(content: &C, cid: &Cid) -> Result<std::result::Result<T, String>>
where
    C: ContentStore,
    T: serde::de::DeserializeOwned + Send,
{
    match content.fetch_json::<T>(cid).await {
        Ok(value) => Ok(Ok(value)),
        Err(StorageError::Serialize(e)) => Ok(Err(format!("{} is not valid JSON: {}", cid, e))),
        Err(e) => Err(e.into()),
    }
}

impl<L, S, C> FrontierCrawler<L, S, C>
where
    L: BrowserLauncher,
    S: CrawlStore,
    C: ContentStore,
{
    /// Check a submitted proof for `round`.
    ///
    /// Up to `audit_sample` items are re-rendered; author and text must
    /// still match the anchored blob. Counters are not compared.
    pub async fn validate_proof(&mut self, cid: &Cid, round: u64) -> Result<AuditVerdict> {
        let content = self.content().clone();

        let items: Vec<ItemCid> = match fetch_decoded(content.as_ref(), cid).await? {
            Ok(items) => items,
            Err(reason) => return Ok(AuditVerdict::invalid(reason)),
        };

        if items.is_empty() {
            return Ok(AuditVerdict::invalid("proof lists no items"));
        }
        if let Some(stray) = items.iter().find(|item| item.round != round) {
            return Ok(AuditVerdict::invalid(format!(
                "{} claims round {}, expected {}",
                stray.id, stray.round, round
            )));
        }

        let sample = self.config().audit_sample.min(items.len());
        for item in items.iter().take(sample) {
            let claimed: ItemBlob = match fetch_decoded(content.as_ref(), &item.cid).await? {
                Ok(blob) => blob,
                Err(reason) => return Ok(AuditVerdict::invalid(reason)),
            };
            if claimed.url != item.id {
                return Ok(AuditVerdict::invalid(format!(
                    "blob {} describes {}, not {}",
                    item.cid, claimed.url, item.id
                )));
            }

            let record = self.extract_at(&item.id, None, round).await?;
            let Some(seen) = record.fields else {
                return Ok(AuditVerdict::invalid(format!("{} no longer renders", item.id)));
            };
            if seen.author != claimed.fields.author || seen.text != claimed.fields.text {
                return Ok(AuditVerdict::invalid(format!(
                    "{} does not match its anchored content",
                    item.id
                )));
            }
        }

        info!(cid = %cid, round, checked = sample, "Proof validated");
        Ok(AuditVerdict::Valid { checked: sample })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MemoryContentStore;
    use crate::security::Credentials;
    use crate::stores::MemoryStore;
    use crate::testing::{item_page_html, ItemFixture, MockBrowser};
    use crate::traits::round::FixedRound;
    use crate::types::config::CrawlerConfig;
    use crate::types::record::ItemFields;
    use std::sync::Arc;

    const URL: &str = "https://twitter.com/alice/status/1";

    fn auditor(
        browser: MockBrowser,
        content: Arc<MemoryContentStore>,
    ) -> FrontierCrawler<MockBrowser, MemoryStore, MemoryContentStore> {
        FrontierCrawler::new(
            browser,
            Credentials::new("auditor", "pw"),
            Arc::new(MemoryStore::new()),
            content,
            Arc::new(FixedRound::new(9)),
            CrawlerConfig::default().without_settle_delays(),
        )
        .unwrap()
    }

    async fn anchor(content: &MemoryContentStore, author: &str, text: &str, round: u64) -> Cid {
        let blob = ItemBlob {
            url: URL.to_string(),
            round,
            fields: ItemFields::new(author, text),
        };
        let item_cid = content.store_json(&blob).await.unwrap();
        content
            .store_json(&vec![ItemCid::new(URL, round, item_cid)])
            .await
            .unwrap()
    }

    fn live_page() -> MockBrowser {
        MockBrowser::new().with_page(URL, item_page_html(&ItemFixture::new("alice", "gm"), &[]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_proof_is_valid() {
        let content = Arc::new(MemoryContentStore::new());
        let proof = anchor(&content, "alice", "gm", 8).await;
        let mut auditor = auditor(live_page(), content);

        let verdict = auditor.validate_proof(&proof, 8).await.unwrap();
        assert_eq!(verdict, AuditVerdict::Valid { checked: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_altered_text_is_invalid() {
        let content = Arc::new(MemoryContentStore::new());
        let proof = anchor(&content, "alice", "gn", 8).await;
        let mut auditor = auditor(live_page(), content);

        assert!(!auditor.validate_proof(&proof, 8).await.unwrap().is_valid());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_round_is_invalid() {
        let content = Arc::new(MemoryContentStore::new());
        let proof = anchor(&content, "alice", "gm", 7).await;
        let browser = live_page();
        let mut auditor = auditor(browser.clone(), content);

        assert!(!auditor.validate_proof(&proof, 8).await.unwrap().is_valid());
        assert_eq!(browser.launch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_item_is_invalid() {
        let content = Arc::new(MemoryContentStore::new());
        let proof = anchor(&content, "alice", "gm", 8).await;
        let mut auditor = auditor(MockBrowser::new(), content);

        let verdict = auditor.validate_proof(&proof, 8).await.unwrap();
        assert!(matches!(verdict, AuditVerdict::Invalid { reason } if reason.contains("no longer renders")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_proof_is_invalid() {
        let content = Arc::new(MemoryContentStore::new());
        let cid = content
            .store(vec![crate::types::cid::NamedBlob::new("data.json", b"not json".to_vec())])
            .await
            .unwrap();
        let mut auditor = auditor(MockBrowser::new(), content);

        assert!(!auditor.validate_proof(&cid, 8).await.unwrap().is_valid());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_cid_is_an_error() {
        let content = Arc::new(MemoryContentStore::new());
        let mut auditor = auditor(MockBrowser::new(), content);

        assert!(auditor
            .validate_proof(&Cid::new("f0170missing"), 8)
            .await
            .is_err());
    }
}
