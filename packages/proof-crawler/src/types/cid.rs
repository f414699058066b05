//! Content identifiers and the records that index them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A content identifier returned by the content-addressed store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Cid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One named file handed to the content-addressed store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBlob {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl NamedBlob {
    /// File name used for every JSON document this crate anchors.
    pub const JSON_NAME: &'static str = "data.json";

    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Serialize a value into a `data.json` blob.
    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(Self::new(Self::JSON_NAME, serde_json::to_vec(value)?))
    }
}

/// CID of one stored record, tagged with the round it was harvested in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCid {
    /// Source URL of the record
    pub id: String,
    pub round: u64,
    pub cid: Cid,
}

impl ItemCid {
    pub fn new(id: impl Into<String>, round: u64, cid: Cid) -> Self {
        Self {
            id: id.into(),
            round,
            cid,
        }
    }
}

/// The aggregated proof of one round. Frozen once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofCid {
    /// Always `proof:<round>`
    pub id: String,
    pub round: u64,
    pub cid: Cid,
}

impl ProofCid {
    pub fn new(round: u64, cid: Cid) -> Self {
        Self {
            id: Self::id_for(round),
            round,
            cid,
        }
    }

    /// Store key for a round's proof.
    pub fn id_for(round: u64) -> String {
        format!("proof:{}", round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_id_format() {
        let proof = ProofCid::new(12, Cid::from("bafy"));
        assert_eq!(proof.id, "proof:12");
    }

    #[test]
    fn test_cid_serializes_as_plain_string() {
        let item = ItemCid::new("https://example.com/u/status/1", 2, Cid::from("cidA"));
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(
            json,
            r#"{"id":"https://example.com/u/status/1","round":2,"cid":"cidA"}"#
        );
    }
}
