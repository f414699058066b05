//! Content-addressed storage trait.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::types::cid::{Cid, NamedBlob};

/// Commits named blobs and returns one CID covering all of them.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store one or more named files as a single unit.
    async fn store(&self, blobs: Vec<NamedBlob>) -> StorageResult<Cid>;

    /// Retrieve the file `name` stored under `cid`.
    async fn fetch(&self, cid: &Cid, name: &str) -> StorageResult<Vec<u8>>;

    /// Store a single JSON document as `data.json`.
    async fn store_json<T: serde::Serialize + Sync>(&self, value: &T) -> StorageResult<Cid>
    where
        Self: Sized,
    {
        let blob = NamedBlob::json(value)?;
        self.store(vec![blob]).await
    }

    /// Fetch and decode the `data.json` document stored under `cid`.
    async fn fetch_json<T: serde::de::DeserializeOwned + Send>(&self, cid: &Cid) -> StorageResult<T>
    where
        Self: Sized,
    {
        let bytes = self.fetch(cid, NamedBlob::JSON_NAME).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
