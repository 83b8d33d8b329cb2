//! Shared handler state and its construction from config.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use snap2listing_integrations::{
    BillingPortal, DEFAULT_MAX_DOWNLOAD_BYTES, FalVideoGenerator, HttpImageFetcher,
    HttpObjectStore, ImageFetcher, ObjectStore, StripeBillingPortal, Unconfigured,
    VideoGenerator,
};
use snap2listing_seo::{
    CopyModel, HttpSuggestionSource, KeywordEngine, NoSuggestions, OpenRouterCopyModel, SeoBrain,
    SuggestionSource, TemplateCopyModel,
};
use snap2listing_shared::{AppConfig, Result};
use snap2listing_storage::Storage;

/// Tunables the handlers read per request.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Default monthly video quota (per-user overrides live in storage).
    pub video_monthly_limit: u32,
    /// Delay before answering a video status poll.
    pub video_status_delay: Duration,
    /// Largest decoded upload accepted.
    pub max_upload_bytes: usize,
}

/// Everything a handler can reach.
pub struct AppState {
    pub storage: Storage,
    pub keywords: Arc<KeywordEngine>,
    pub brain: SeoBrain,
    pub billing: Arc<dyn BillingPortal>,
    pub objects: Arc<dyn ObjectStore>,
    pub video: Arc<dyn VideoGenerator>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub limits: Limits,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire real clients from config. Services without credentials are
    /// replaced by [`Unconfigured`] stand-ins and logged at `warn`.
    pub fn from_config(config: &AppConfig, storage: Storage) -> Result<Self> {
        let source: Arc<dyn SuggestionSource> = if config.suggest.enabled {
            Arc::new(HttpSuggestionSource::from_config(&config.suggest)?)
        } else {
            Arc::new(NoSuggestions)
        };
        let keywords = Arc::new(KeywordEngine::new(source));

        let model: Arc<dyn CopyModel> = match OpenRouterCopyModel::from_config(&config.openrouter)? {
            Some(model) => Arc::new(model),
            None => Arc::new(TemplateCopyModel),
        };
        let brain = SeoBrain::new(model, keywords.clone());

        let billing: Arc<dyn BillingPortal> =
            match StripeBillingPortal::from_config(&config.stripe, &config.server.public_base_url)? {
                Some(portal) => Arc::new(portal),
                None => {
                    warn!(env = %config.stripe.secret_key_env, "Stripe key not set, billing portal disabled");
                    Arc::new(Unconfigured("billing portal"))
                }
            };

        let objects: Arc<dyn ObjectStore> = match HttpObjectStore::from_config(&config.object_storage)? {
            Some(store) => Arc::new(store),
            None => {
                warn!("object storage not configured, uploads disabled");
                Arc::new(Unconfigured("object storage"))
            }
        };

        let video: Arc<dyn VideoGenerator> = match FalVideoGenerator::from_config(&config.fal)? {
            Some(generator) => Arc::new(generator),
            None => {
                warn!(env = %config.fal.api_key_env, "FAL key not set, video generation disabled");
                Arc::new(Unconfigured("video generation"))
            }
        };

        let fetcher = Arc::new(HttpImageFetcher::new(
            DEFAULT_MAX_DOWNLOAD_BYTES,
            config.server.allow_private_downloads,
        )?);

        info!(model = brain.model_id(), "application state ready");

        Ok(Self {
            storage,
            keywords,
            brain,
            billing,
            objects,
            video,
            fetcher,
            limits: Limits {
                video_monthly_limit: config.usage.video_monthly_limit,
                video_status_delay: Duration::from_millis(config.video.status_delay_ms),
                max_upload_bytes: config.object_storage.max_upload_mb * 1024 * 1024,
            },
        })
    }
}
