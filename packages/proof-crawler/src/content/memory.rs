//! In-memory content-addressed store.
//!
//! CIDs are CIDv1 strings in base16 multibase (`f` prefix) over a sha-256
//! multihash of the blob set, so identical uploads get identical CIDs.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::traits::content::ContentStore;
use crate::types::cid::{Cid, NamedBlob};

/// CIDv1 header: version 1, dag-pb codec, sha2-256, 32-byte digest.
const CID_V1_DAG_PB_SHA256: &str = "01701220";

/// Compute the deterministic CID of a blob set.
pub fn compute_cid(blobs: &[NamedBlob]) -> Cid {
    let mut hasher = Sha256::new();
    for blob in blobs {
        hasher.update(blob.name.as_bytes());
        hasher.update([0u8]);
        hasher.update((blob.bytes.len() as u64).to_be_bytes());
        hasher.update(&blob.bytes);
    }
    Cid::new(format!(
        "f{}{}",
        CID_V1_DAG_PB_SHA256,
        hex::encode(hasher.finalize())
    ))
}

/// Content store that keeps blobs in memory.
#[derive(Default)]
pub struct MemoryContentStore {
    objects: RwLock<HashMap<Cid, Vec<NamedBlob>>>,
    writes: AtomicUsize,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `store` calls made so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of distinct CIDs held.
    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn store(&self, blobs: Vec<NamedBlob>) -> StorageResult<Cid> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let cid = compute_cid(&blobs);
        self.objects.write().unwrap().insert(cid.clone(), blobs);
        Ok(cid)
    }

    async fn fetch(&self, cid: &Cid, name: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .unwrap()
            .get(cid)
            .and_then(|blobs| blobs.iter().find(|b| b.name == name))
            .map(|b| b.bytes.clone())
            .ok_or_else(|| StorageError::NotFound {
                cid: format!("{}/{}", cid, name),
            })
    }
}
