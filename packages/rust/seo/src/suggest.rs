//! Search-suggestion sources for autosuggest mining.
//!
//! [`HttpSuggestionSource`] speaks the OpenSearch suggestions JSON format
//! (`["query", ["suggestion", ...]]`) used by most query-completion endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use snap2listing_shared::{Result, Snap2ListingError, SuggestConfig};

/// User-Agent string for suggestion requests.
const USER_AGENT: &str = concat!("Snap2Listing/", env!("CARGO_PKG_VERSION"));

/// A provider of query completions for a seed phrase.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Completions for `query`, best first.
    async fn suggest(&self, query: &str) -> Result<Vec<String>>;
}

/// Source that never suggests anything (autosuggest disabled).
pub struct NoSuggestions;

#[async_trait]
impl SuggestionSource for NoSuggestions {
    fn name(&self) -> &str {
        "none"
    }

    async fn suggest(&self, _query: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Query-completion endpoint reached over HTTP.
pub struct HttpSuggestionSource {
    client: Client,
    endpoint: String,
}

impl HttpSuggestionSource {
    /// Create a source for `endpoint` with a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Snap2ListingError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Build from the `[suggest]` config section.
    pub fn from_config(config: &SuggestConfig) -> Result<Self> {
        Self::new(config.endpoint.clone(), config.timeout_secs)
    }
}

#[async_trait]
impl SuggestionSource for HttpSuggestionSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn suggest(&self, query: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("client", "firefox"), ("q", query)])
            .send()
            .await
            .map_err(|e| Snap2ListingError::Network(format!("suggest: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Snap2ListingError::Upstream {
                service: "suggest",
                status: status.as_u16(),
                message: format!("query '{query}' failed"),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Snap2ListingError::parse(format!("suggest response: {e}")))?;

        let suggestions = parse_opensearch(&body)?;
        debug!(query, count = suggestions.len(), "suggestions received");
        Ok(suggestions)
    }
}

/// Extract the suggestion list from an OpenSearch suggestions payload.
fn parse_opensearch(body: &serde_json::Value) -> Result<Vec<String>> {
    let list = body
        .get(1)
        .and_then(|v| v.as_array())
        .ok_or_else(|| Snap2ListingError::parse("suggest response is not an OpenSearch array"))?;

    Ok(list
        .iter()
        .filter_map(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
