//! Customer billing portal sessions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, instrument};

use snap2listing_shared::{Result, Snap2ListingError, StripeConfig, read_secret};

use crate::USER_AGENT;

/// Creates hosted billing-portal sessions for existing customers.
#[async_trait]
pub trait BillingPortal: Send + Sync {
    /// Returns the portal URL the customer should be redirected to.
    async fn create_session(&self, customer_id: &str) -> Result<String>;
}

/// Stripe billing-portal client.
pub struct StripeBillingPortal {
    client: Client,
    api_base: String,
    secret_key: String,
    return_url: String,
}

#[derive(Debug, serde::Deserialize)]
struct PortalSession {
    url: String,
}

impl StripeBillingPortal {
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| Snap2ListingError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            return_url: return_url.into(),
        })
    }

    /// Build from config. `Ok(None)` when the secret key variable is unset.
    ///
    /// The return URL is `public_base_url` joined with the configured return path.
    pub fn from_config(config: &StripeConfig, public_base_url: &str) -> Result<Option<Self>> {
        let Some(secret) = read_secret(&config.secret_key_env) else {
            return Ok(None);
        };
        let return_url = format!(
            "{}{}",
            public_base_url.trim_end_matches('/'),
            config.return_path
        );
        Self::new(config.api_base.clone(), secret, return_url).map(Some)
    }
}

#[async_trait]
impl BillingPortal for StripeBillingPortal {
    #[instrument(skip_all, fields(customer = %customer_id))]
    async fn create_session(&self, customer_id: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/billing_portal/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&[("customer", customer_id), ("return_url", self.return_url.as_str())])
            .send()
            .await
            .map_err(|e| Snap2ListingError::Network(format!("stripe: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Snap2ListingError::Upstream {
                service: "stripe",
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }

        let session: PortalSession = response
            .json()
            .await
            .map_err(|e| Snap2ListingError::parse(format!("stripe session: {e}")))?;

        info!("billing portal session created");
        Ok(session.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_portal_session() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/billing_portal/sessions"))
            .and(wiremock::matchers::header("authorization", "Bearer sk_test"))
            .and(wiremock::matchers::body_string_contains("customer=cus_123"))
            .and(wiremock::matchers::body_string_contains("return_url="))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"id": "bps_1", "url": "https://billing.stripe.com/p/session/abc"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let portal = StripeBillingPortal::new(
            server.uri(),
            "sk_test",
            "http://localhost:3000/app/settings/billing",
        )
        .unwrap();
        let url = portal.create_session("cus_123").await.unwrap();
        assert_eq!(url, "https://billing.stripe.com/p/session/abc");
    }

    #[tokio::test]
    async fn stripe_error_is_upstream() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(400).set_body_json(
                serde_json::json!({"error": {"message": "No such customer"}}),
            ))
            .mount(&server)
            .await;

        let portal = StripeBillingPortal::new(server.uri(), "sk_test", "http://x").unwrap();
        let err = portal.create_session("cus_missing").await.unwrap_err();
        assert!(matches!(
            err,
            Snap2ListingError::Upstream { service: "stripe", status: 400, .. }
        ));
    }

    #[test]
    fn unset_secret_disables_portal() {
        let config = StripeConfig {
            secret_key_env: "SNAP2LISTING_TEST_UNSET_STRIPE_KEY".into(),
            ..StripeConfig::default()
        };
        assert!(
            StripeBillingPortal::from_config(&config, "http://localhost:3000")
                .unwrap()
                .is_none()
        );
    }
}
