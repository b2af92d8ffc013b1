use crate::models::uploads::StoredDocument;
use crate::utils;

use anyhow::{anyhow, bail};
use reqwest;

/// Client for the external object store's upload endpoint. The store is
/// opaque: bytes go in, a URL and some metadata come back.
pub struct StorageApi {
    auth_token: String,
    url: String,
    client: reqwest::Client,
}

impl StorageApi {
    pub fn new(auth_token: String, url: String) -> Self {
        Self {
            auth_token,
            url,
            client: reqwest::Client::new(),
        }
    }

    pub async fn upload_document(
        &self,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<StoredDocument, anyhow::Error> {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/upload", self.url))
            .bearer_auth(&self.auth_token)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Storage: upload rejected with status {}", response.status());
        }

        let body: serde_json::Value = response.json().await?;
        let url = body
            .get("secure_url")
            .or_else(|| body.get("url"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Storage: bad response format."))?;

        Ok(StoredDocument {
            url: utils::normalize_preview_url(url),
            public_id: body
                .get("public_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            bytes: body.get("bytes").and_then(|v| v.as_i64()).unwrap_or(0),
            format: body
                .get("format")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}
