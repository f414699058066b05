//! Per-round proof aggregation.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{CrawlerError, Result};
use crate::traits::{content::ContentStore, store::CrawlStore};
use crate::types::cid::{Cid, ProofCid};

/// Builds, anchors and memoizes the proof for a round.
pub struct ProofAggregator<S: CrawlStore, C: ContentStore> {
    store: Arc<S>,
    content: Arc<C>,
}

impl<S: CrawlStore, C: ContentStore> Clone for ProofAggregator<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            content: self.content.clone(),
        }
    }
}

impl<S: CrawlStore, C: ContentStore> ProofAggregator<S, C> {
    pub fn new(store: Arc<S>, content: Arc<C>) -> Self {
        Self { store, content }
    }

    /// CID of the proof for `round`, creating it on first request.
    ///
    /// The proof blob is the round's ItemCid list in insertion order. Once a
    /// proof exists it is returned unchanged, even if more items arrive.
    pub async fn get_proof_cid(&self, round: u64) -> Result<Cid> {
        if let Some(proof) = self.store.get_proof(round).await? {
            debug!(round, cid = %proof.cid, "Proof already anchored");
            return Ok(proof.cid);
        }

        let items = self.store.item_cids_for_round(round).await?;
        if items.is_empty() {
            return Err(CrawlerError::NoData { round });
        }

        let cid = self.content.store_json(&items).await?;
        let proof = ProofCid::new(round, cid);

        if !self.store.put_proof(&proof).await? {
            // Lost a race with another aggregator; theirs is authoritative.
            if let Some(existing) = self.store.get_proof(round).await? {
                return Ok(existing.cid);
            }
        }

        info!(round, items = items.len(), cid = %proof.cid, "Anchored proof");
        Ok(proof.cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MemoryContentStore;
    use crate::stores::MemoryStore;
    use crate::traits::store::{ItemCidStore, ProofStore};
    use crate::types::cid::ItemCid;

    fn aggregator() -> (
        ProofAggregator<MemoryStore, MemoryContentStore>,
        Arc<MemoryStore>,
        Arc<MemoryContentStore>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let content = Arc::new(MemoryContentStore::new());
        (
            ProofAggregator::new(store.clone(), content.clone()),
            store,
            content,
        )
    }

    #[tokio::test]
    async fn test_no_data_for_empty_round() {
        let (aggregator, store, content) = aggregator();
        assert!(matches!(
            aggregator.get_proof_cid(3).await,
            Err(CrawlerError::NoData { round: 3 })
        ));
        assert_eq!(store.proof_count(), 0);
        assert_eq!(content.write_count(), 0);
    }

    #[tokio::test]
    async fn test_proof_is_written_once() {
        let (aggregator, store, content) = aggregator();
        store
            .put_item_cid(&ItemCid::new("https://x/status/1", 5, Cid::new("a")))
            .await
            .unwrap();

        let first = aggregator.get_proof_cid(5).await.unwrap();
        store
            .put_item_cid(&ItemCid::new("https://x/status/2", 5, Cid::new("b")))
            .await
            .unwrap();
        let second = aggregator.get_proof_cid(5).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(content.write_count(), 1);
        let proof = store.get_proof(5).await.unwrap().unwrap();
        assert_eq!(proof.id, "proof:5");
        assert_eq!(proof.cid, first);
    }

    #[tokio::test]
    async fn test_proof_blob_lists_item_cids() {
        let (aggregator, store, content) = aggregator();
        let items = vec![
            ItemCid::new("https://x/status/1", 2, Cid::new("a")),
            ItemCid::new("https://x/status/2", 2, Cid::new("b")),
        ];
        for item in &items {
            store.put_item_cid(item).await.unwrap();
        }

        let cid = aggregator.get_proof_cid(2).await.unwrap();
        let blob: Vec<ItemCid> = content.fetch_json(&cid).await.unwrap();
        assert_eq!(blob, items);
    }
}
