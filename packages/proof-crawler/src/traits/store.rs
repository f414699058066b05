//! Durable storage traits for records, item CIDs and round proofs.
//!
//! The storage layer is split into focused traits:
//! - `RecordStore`: parsed items, keyed by source URL
//! - `ItemCidStore`: per-item CIDs, listed by round
//! - `ProofStore`: one frozen proof CID per round
//! - `CrawlStore`: composite trait combining all three

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::types::{
    cid::{ItemCid, ProofCid},
    record::Record,
};

/// Store for harvested records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or overwrite the record for `record.url`.
    async fn put_record(&self, record: &Record) -> StorageResult<()>;

    async fn get_record(&self, url: &str) -> StorageResult<Option<Record>>;

    async fn count_records(&self) -> StorageResult<usize>;
}

/// Store for per-item CIDs.
#[async_trait]
pub trait ItemCidStore: Send + Sync {
    /// Record an item CID. Re-inserting the same `(round, id)` replaces the
    /// CID but keeps the entry's original position.
    async fn put_item_cid(&self, item: &ItemCid) -> StorageResult<()>;

    /// All item CIDs of a round, in insertion order.
    async fn item_cids_for_round(&self, round: u64) -> StorageResult<Vec<ItemCid>>;
}

/// Store for per-round proofs.
#[async_trait]
pub trait ProofStore: Send + Sync {
    async fn get_proof(&self, round: u64) -> StorageResult<Option<ProofCid>>;

    /// Insert a proof. Returns `false` (and changes nothing) if the round
    /// already has one.
    async fn put_proof(&self, proof: &ProofCid) -> StorageResult<bool>;
}

/// Composite trait for backends that hold all three logical stores.
pub trait CrawlStore: RecordStore + ItemCidStore + ProofStore {}

// Blanket implementation
impl<T: RecordStore + ItemCidStore + ProofStore> CrawlStore for T {}
