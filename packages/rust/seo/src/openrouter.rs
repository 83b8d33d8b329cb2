//! OpenRouter chat-completions copy model.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument, warn};

use snap2listing_shared::{ListingContent, OpenRouterConfig, Result, Snap2ListingError, read_secret};

use crate::model::{CopyModel, ListingBrief, RewriteBrief};

const USER_AGENT: &str = concat!("Snap2Listing/", env!("CARGO_PKG_VERSION"));

const SYSTEM_PROMPT: &str = "You are an e-commerce SEO copywriter. \
Reply with a single JSON object with the keys \"title\" (string), \
\"description\" (string) and \"tags\" (array of strings). \
Never invent product facts that are not in the brief.";

/// Copy model backed by an OpenRouter-hosted LLM.
pub struct OpenRouterCopyModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, serde::Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, serde::Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterCopyModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Snap2ListingError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from config. Returns `Ok(None)` when the API key variable is unset.
    pub fn from_config(config: &OpenRouterConfig) -> Result<Option<Self>> {
        let Some(api_key) = read_secret(&config.api_key_env) else {
            warn!(
                env = %config.api_key_env,
                "OpenRouter API key not set, falling back to template copy"
            );
            return Ok(None);
        };

        Self::new(
            config.base_url.clone(),
            config.default_model.clone(),
            api_key,
            config.timeout_secs,
        )
        .map(Some)
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, user_content: serde_json::Value) -> Result<ListingContent> {
        let body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_content },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Snap2ListingError::Network(format!("openrouter: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Snap2ListingError::Upstream {
                service: "openrouter",
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Snap2ListingError::parse(format!("openrouter response: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Snap2ListingError::Generation("model returned no content".into()))?;

        debug!(chars = content.len(), "model reply received");
        parse_listing_json(&content)
    }
}

#[async_trait]
impl CopyModel for OpenRouterCopyModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn write_listing(&self, brief: &ListingBrief) -> Result<ListingContent> {
        let channel = brief.channel;
        let prompt = format!(
            "Write a {name} listing.\n\
             Product: {desc}\nCategory: {category}\n\
             Keywords (best first): {keywords}\n\
             Limits: title <= {title_max} chars, description <= {desc_max} chars, \
             up to {tags} tags of <= {tag_chars} chars each. \
             Put the first keyword at the start of the title.",
            name = channel.display_name,
            desc = brief.short_description,
            category = brief.category,
            keywords = brief.keywords.join(", "),
            title_max = channel.title_max,
            desc_max = channel.description_max,
            tags = channel.tag_limit,
            tag_chars = channel.tag_max_chars,
        );

        self.complete(json!([
            { "type": "text", "text": prompt },
            { "type": "image_url", "image_url": { "url": brief.product_image } },
        ]))
        .await
    }

    async fn rewrite_listing(&self, brief: &RewriteBrief) -> Result<ListingContent> {
        let focus: Vec<&str> = brief.focus.iter().map(|f| f.as_str()).collect();
        let current = serde_json::to_string(&brief.current)
            .map_err(|e| Snap2ListingError::Generation(format!("encode listing: {e}")))?;
        let prompt = format!(
            "Optimize this {name} listing for the keywords: {keywords}.\n\
             Rewrite only these fields: {focus}. Copy the other fields unchanged.\n\
             Current listing JSON: {current}",
            name = brief.channel.display_name,
            keywords = brief.target_keywords.join(", "),
            focus = focus.join(", "),
        );

        self.complete(json!(prompt)).await
    }
}

/// Parse the model's JSON reply, tolerating a surrounding code fence.
fn parse_listing_json(raw: &str) -> Result<ListingContent> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced.trim())
        .map_err(|e| Snap2ListingError::Generation(format!("model reply is not listing JSON: {e}")))
}
