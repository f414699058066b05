//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StorageResult;
use crate::traits::store::{ItemCidStore, ProofStore, RecordStore};
use crate::types::{
    cid::{ItemCid, ProofCid},
    record::Record,
};

/// In-memory storage for records, item CIDs and proofs.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
pub struct MemoryStore {
    records: RwLock<HashMap<String, Record>>,
    item_cids: RwLock<HashMap<u64, IndexMap<String, ItemCid>>>,
    proofs: RwLock<HashMap<u64, ProofCid>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            item_cids: RwLock::new(HashMap::new()),
            proofs: RwLock::new(HashMap::new()),
        }
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.records.write().unwrap().clear();
        self.item_cids.write().unwrap().clear();
        self.proofs.write().unwrap().clear();
    }

    /// Get the number of stored item CIDs across all rounds.
    pub fn item_cid_count(&self) -> usize {
        self.item_cids
            .read()
            .unwrap()
            .values()
            .map(|round| round.len())
            .sum()
    }

    /// Get the number of stored proofs.
    pub fn proof_count(&self) -> usize {
        self.proofs.read().unwrap().len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put_record(&self, record: &Record) -> StorageResult<()> {
        self.records
            .write()
            .unwrap()
            .insert(record.url.clone(), record.clone());
        Ok(())
    }

    async fn get_record(&self, url: &str) -> StorageResult<Option<Record>> {
        Ok(self.records.read().unwrap().get(url).cloned())
    }

    async fn count_records(&self) -> StorageResult<usize> {
        Ok(self.records.read().unwrap().len())
    }
}

#[async_trait]
impl ItemCidStore for MemoryStore {
    async fn put_item_cid(&self, item: &ItemCid) -> StorageResult<()> {
        self.item_cids
            .write()
            .unwrap()
            .entry(item.round)
            .or_default()
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn item_cids_for_round(&self, round: u64) -> StorageResult<Vec<ItemCid>> {
        Ok(self
            .item_cids
            .read()
            .unwrap()
            .get(&round)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProofStore for MemoryStore {
    async fn get_proof(&self, round: u64) -> StorageResult<Option<ProofCid>> {
        Ok(self.proofs.read().unwrap().get(&round).cloned())
    }

    async fn put_proof(&self, proof: &ProofCid) -> StorageResult<bool> {
        let mut proofs = self.proofs.write().unwrap();
        if proofs.contains_key(&proof.round) {
            return Ok(false);
        }
        proofs.insert(proof.round, proof.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cid::Cid;
    use crate::types::record::ItemFields;

    #[tokio::test]
    async fn test_record_overwrites_by_url() {
        let store = MemoryStore::new();
        let url = "https://example.com/a/status/1";

        store
            .put_record(&Record::new(url, 1, ItemFields::new("@a", "first")))
            .await
            .unwrap();
        store
            .put_record(&Record::new(url, 2, ItemFields::new("@a", "second")))
            .await
            .unwrap();

        assert_eq!(store.count_records().await.unwrap(), 1);
        let stored = store.get_record(url).await.unwrap().unwrap();
        assert_eq!(stored.round, 2);
        assert_eq!(stored.fields.unwrap().text, "second");
    }

    #[tokio::test]
    async fn test_item_cids_keep_insertion_order_per_round() {
        let store = MemoryStore::new();
        for (id, cid) in [("u3", "c3"), ("u1", "c1"), ("u2", "c2")] {
            store
                .put_item_cid(&ItemCid::new(id, 5, Cid::from(cid)))
                .await
                .unwrap();
        }
        store
            .put_item_cid(&ItemCid::new("other", 6, Cid::from("c9")))
            .await
            .unwrap();

        let ids: Vec<_> = store
            .item_cids_for_round(5)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec!["u3", "u1", "u2"]);
        assert!(store.item_cids_for_round(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reinserted_item_keeps_position() {
        let store = MemoryStore::new();
        store.put_item_cid(&ItemCid::new("a", 1, Cid::from("old"))).await.unwrap();
        store.put_item_cid(&ItemCid::new("b", 1, Cid::from("b"))).await.unwrap();
        store.put_item_cid(&ItemCid::new("a", 1, Cid::from("new"))).await.unwrap();

        let items = store.item_cids_for_round(1).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "a");
        assert_eq!(items[0].cid, Cid::from("new"));
    }

    #[tokio::test]
    async fn test_proof_is_frozen() {
        let store = MemoryStore::new();
        assert!(store.put_proof(&ProofCid::new(3, Cid::from("first"))).await.unwrap());
        assert!(!store.put_proof(&ProofCid::new(3, Cid::from("second"))).await.unwrap());

        let proof = store.get_proof(3).await.unwrap().unwrap();
        assert_eq!(proof.cid, Cid::from("first"));
        assert_eq!(store.proof_count(), 1);
    }
}
