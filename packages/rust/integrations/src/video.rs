//! Image-to-video generation through the FAL queue API.
//!
//! A request is submitted to `{queue_base}/{model}`, its status URL is polled
//! until the job completes, then the result is read from the response URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument};

use snap2listing_shared::{FalConfig, Result, Snap2ListingError, read_secret};

use crate::USER_AGENT;

/// What to animate.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    pub image_url: String,
}

/// A finished video.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedVideo {
    /// Provider-side request id.
    pub request_id: String,
    pub url: String,
}

/// Turns a product image and prompt into a short video.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(&self, request: &VideoRequest) -> Result<GeneratedVideo>;
}

/// FAL queue client.
pub struct FalVideoGenerator {
    client: Client,
    queue_base: String,
    model: String,
    api_key: String,
    poll_interval: Duration,
    max_wait: Duration,
}

#[derive(Debug, Deserialize)]
struct QueueSubmission {
    request_id: String,
    status_url: String,
    response_url: String,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct VideoResult {
    video: VideoFile,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    url: String,
}

impl FalVideoGenerator {
    pub fn new(
        queue_base: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Snap2ListingError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            queue_base: queue_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            poll_interval,
            max_wait,
        })
    }

    /// Build from config. `Ok(None)` when the API key variable is unset.
    pub fn from_config(config: &FalConfig) -> Result<Option<Self>> {
        let Some(key) = read_secret(&config.api_key_env) else {
            return Ok(None);
        };
        Self::new(
            config.queue_base.clone(),
            config.model.clone(),
            key,
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_secs(config.max_wait_secs),
        )
        .map(Some)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("Key {}", self.api_key))
            .send()
            .await
            .map_err(|e| Snap2ListingError::Network(format!("fal: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Snap2ListingError::Upstream {
                service: "fal",
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| Snap2ListingError::parse(format!("fal response: {e}")))
    }

    async fn submit(&self, request: &VideoRequest) -> Result<QueueSubmission> {
        let response = self
            .client
            .post(format!("{}/{}", self.queue_base, self.model))
            .header(reqwest::header::AUTHORIZATION, format!("Key {}", self.api_key))
            .json(&json!({
                "prompt": request.prompt,
                "image_url": request.image_url,
            }))
            .send()
            .await
            .map_err(|e| Snap2ListingError::Network(format!("fal: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Snap2ListingError::Upstream {
                service: "fal",
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| Snap2ListingError::parse(format!("fal submission: {e}")))
    }
}

#[async_trait]
impl VideoGenerator for FalVideoGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &VideoRequest) -> Result<GeneratedVideo> {
        let submission = self.submit(request).await?;
        info!(request_id = %submission.request_id, "video request queued");

        let deadline = Instant::now() + self.max_wait;
        loop {
            let status: QueueStatus = self.get_json(&submission.status_url).await?;
            debug!(request_id = %submission.request_id, status = %status.status, "video status");

            match status.status.as_str() {
                "COMPLETED" => break,
                "IN_QUEUE" | "IN_PROGRESS" => {}
                other => {
                    return Err(Snap2ListingError::Generation(format!(
                        "video request {} ended with status {other}",
                        submission.request_id
                    )));
                }
            }

            if Instant::now() >= deadline {
                return Err(Snap2ListingError::Generation(format!(
                    "video request {} did not finish within {}s",
                    submission.request_id,
                    self.max_wait.as_secs()
                )));
            }
            sleep(self.poll_interval).await;
        }

        let result: VideoResult = self.get_json(&submission.response_url).await?;
        info!(request_id = %submission.request_id, "video generated");

        Ok(GeneratedVideo {
            request_id: submission.request_id,
            url: result.video.url,
        })
    }
}
