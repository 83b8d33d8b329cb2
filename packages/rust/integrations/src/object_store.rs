//! Object storage for uploaded product images.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, instrument};

use snap2listing_shared::{ObjectStorageConfig, Result, Snap2ListingError, read_secret};

use crate::USER_AGENT;

/// Stores blobs and returns their public URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}

/// Storage-API compatible HTTP object store (Supabase-style bucket API).
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl HttpObjectStore {
    pub fn new(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Snap2ListingError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            service_key: service_key.into(),
        })
    }

    /// Build from config. `Ok(None)` when no base URL or service key is set.
    pub fn from_config(config: &ObjectStorageConfig) -> Result<Option<Self>> {
        if config.base_url.trim().is_empty() {
            return Ok(None);
        }
        let Some(key) = read_secret(&config.service_key_env) else {
            return Ok(None);
        };
        Self::new(config.base_url.clone(), config.bucket.clone(), key).map(Some)
    }

    /// Public URL for an object in this store's bucket.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    #[instrument(skip_all, fields(bucket = %self.bucket, key = %key, bytes = bytes.len()))]
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let response = self
            .client
            .post(format!(
                "{}/storage/v1/object/{}/{}",
                self.base_url, self.bucket, key
            ))
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| Snap2ListingError::Network(format!("object store: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Snap2ListingError::Upstream {
                service: "object storage",
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }

        info!("object stored");
        Ok(self.public_url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uploads_and_returns_public_url() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(
                "/storage/v1/object/product-images/uploads/2025/03/abc-mug.png",
            ))
            .and(wiremock::matchers::header("content-type", "image/png"))
            .and(wiremock::matchers::header("authorization", "Bearer svc"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"Key": "product-images/uploads/2025/03/abc-mug.png"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(server.uri(), "product-images", "svc").unwrap();
        let url = store
            .put("uploads/2025/03/abc-mug.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(
            url,
            format!(
                "{}/storage/v1/object/public/product-images/uploads/2025/03/abc-mug.png",
                server.uri()
            )
        );
    }

    #[tokio::test]
    async fn rejected_upload_is_upstream_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(413))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(server.uri(), "b", "svc").unwrap();
        let err = store.put("k.png", vec![0], "image/png").await.unwrap_err();
        assert!(matches!(err, Snap2ListingError::Upstream { status: 413, .. }));
    }

    #[test]
    fn unconfigured_store_is_none() {
        let config = ObjectStorageConfig::default();
        assert!(HttpObjectStore::from_config(&config).unwrap().is_none());
    }
}
