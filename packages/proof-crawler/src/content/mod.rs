//! Content-addressed store implementations.
//!
//! - `MemoryContentStore` - deterministic local CIDs (tests, dry runs)
//! - `Web3StorageClient` - upload API + IPFS gateway over HTTP

pub mod memory;
pub mod web3;

pub use memory::{compute_cid, MemoryContentStore};
pub use web3::Web3StorageClient;
