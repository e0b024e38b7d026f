use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::Deserialize;
use shared::protocol::StoredObject;
use url::Url;

use super::{http_client, TokenSource};
use crate::{config::Settings, workflow::ObjectStorage};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    bucket: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

/// Object storage over the hosted storage REST API. Uploads are single-shot
/// media uploads authenticated with the signed-in user's ID token.
pub struct RestObjectStorage {
    http: Client,
    base_url: String,
    bucket: String,
    tokens: Arc<dyn TokenSource>,
}

impl RestObjectStorage {
    pub fn new(settings: &Settings, tokens: Arc<dyn TokenSource>) -> reqwest::Result<Self> {
        Ok(Self {
            http: http_client(settings)?,
            base_url: settings.storage_base_url.trim_end_matches('/').to_string(),
            bucket: settings.storage_bucket.clone(),
            tokens,
        })
    }

    fn upload_url(&self, path: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/b/{}/o", self.base_url, self.bucket))
            .with_context(|| format!("invalid storage endpoint '{}'", self.base_url))?;
        url.query_pairs_mut().append_pair("name", path);
        Ok(url)
    }
}

#[async_trait]
impl ObjectStorage for RestObjectStorage {
    async fn store(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject> {
        let token = self
            .tokens
            .id_token()
            .await
            .context("no credentials available for upload")?;
        let size_sent = bytes.len() as u64;
        let metadata: ObjectMetadata = self
            .http
            .post(self.upload_url(path)?)
            .header(AUTHORIZATION, format!("Firebase {token}"))
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(StoredObject {
            full_path: metadata.name,
            bucket: metadata.bucket,
            size_bytes: metadata
                .size
                .and_then(|size| size.parse().ok())
                .unwrap_or(size_sent),
            content_type: metadata.content_type,
        })
    }
}

#[cfg(test)]
#[path = "../tests/rest_storage_tests.rs"]
mod tests;
