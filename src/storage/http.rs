use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{BlobStore, StorageError, StorageResult};
use crate::domain::documents::StorageType;

/// Remote blob service speaking a small REST protocol.
#[derive(Clone)]
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    id: String,
}

impl HttpBlobStore {
    pub fn new(base_url: &str, token: Option<String>, timeout_seconds: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        tracing::info!(base_url = base_url, "Blob service client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn file_url(&self, reference: &str) -> StorageResult<String> {
        if reference.is_empty() || reference.contains(['/', '?', '#']) {
            return Err(StorageError::InvalidReference(reference.to_string()));
        }
        Ok(format!("{}/files/{}", self.base_url, reference))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn remote_error(response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    StorageError::Remote { status, message }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    fn storage_type(&self) -> StorageType {
        StorageType::BlobService
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, data: Vec<u8>, filename: &str) -> StorageResult<String> {
        let part = multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .authorize(self.client.post(format!("{}/files", self.base_url)))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let body: PutResponse = response.json().await?;
        debug!(reference = %body.id, "Stored file in blob service");
        Ok(body.id)
    }

    async fn get(&self, reference: &str) -> StorageResult<Vec<u8>> {
        let url = self.file_url(reference)?;
        let response = self.authorize(self.client.get(url)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(reference.to_string())),
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            _ => Err(remote_error(response).await),
        }
    }

    async fn delete(&self, reference: &str) -> StorageResult<bool> {
        let url = self.file_url(reference)?;
        let response = self.authorize(self.client.delete(url)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(remote_error(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_rejects_path_segments() {
        let store = HttpBlobStore::new("http://blobs.local/", None, 5).unwrap();
        assert_eq!(
            store.file_url("abc123").unwrap(),
            "http://blobs.local/files/abc123"
        );
        assert!(store.file_url("a/b").is_err());
        assert!(store.file_url("").is_err());
    }
}
