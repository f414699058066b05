//! HTTP client for a web3.storage-compatible upload API.
//!
//! Uploads go to `POST {api}/upload` as multipart files (wrapped in a
//! directory, so each file stays addressable as `{cid}/{name}`); reads go
//! through an IPFS path gateway.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::security::SecretString;
use crate::traits::content::ContentStore;
use crate::types::cid::{Cid, NamedBlob};

const DEFAULT_API_URL: &str = "https://api.web3.storage";
const DEFAULT_GATEWAY_URL: &str = "https://w3s.link/ipfs";

#[derive(Deserialize)]
struct UploadResponse {
    cid: String,
}

/// Content store backed by a web3.storage-style service.
pub struct Web3StorageClient {
    client: Client,
    api_url: String,
    gateway_url: String,
    token: SecretString,
}

impl Web3StorageClient {
    /// Create a client for the public service with the given API token.
    pub fn new(token: impl Into<SecretString>) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            token: token.into(),
        })
    }

    /// Point uploads at another API endpoint.
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Read through another IPFS gateway.
    pub fn with_gateway_url(mut self, url: &str) -> Self {
        self.gateway_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ContentStore for Web3StorageClient {
    async fn store(&self, blobs: Vec<NamedBlob>) -> StorageResult<Cid> {
        let names: Vec<_> = blobs.iter().map(|b| b.name.clone()).collect();
        let mut form = Form::new();
        for blob in blobs {
            let part = Part::bytes(blob.bytes)
                .file_name(blob.name)
                .mime_str("application/json")?;
            form = form.part("file", part);
        }

        debug!(files = ?names, "Uploading to content store");
        let resp = self
            .client
            .post(format!("{}/upload", self.api_url))
            .bearer_auth(self.token.expose())
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StorageError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = resp.json().await?;
        info!(cid = %body.cid, files = ?names, "Stored files");
        Ok(Cid::new(body.cid))
    }

    async fn fetch(&self, cid: &Cid, name: &str) -> StorageResult<Vec<u8>> {
        let url = format!("{}/{}/{}", self.gateway_url, cid, name);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                cid: format!("{}/{}", cid, name),
            });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StorageError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_trimmed() {
        let client = Web3StorageClient::new("token")
            .unwrap()
            .with_api_url("http://localhost:8787/")
            .with_gateway_url("http://localhost:8080/ipfs/");
        assert_eq!(client.api_url, "http://localhost:8787");
        assert_eq!(client.gateway_url, "http://localhost:8080/ipfs");
    }

    #[test]
    fn test_token_never_printed() {
        let client = Web3StorageClient::new("very-secret-token").unwrap();
        assert_eq!(format!("{}", client.token), "[REDACTED]");
    }
}
