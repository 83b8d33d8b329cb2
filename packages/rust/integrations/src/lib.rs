//! Clients for the external services Snap2Listing talks to.
//!
//! Each service sits behind a small trait so the HTTP server can be wired
//! with real clients in production and in-process fakes in tests:
//! - [`BillingPortal`] (Stripe)
//! - [`ObjectStore`] (storage-API bucket)
//! - [`VideoGenerator`] (FAL queue)
//! - [`ImageFetcher`] (download proxy)

pub mod billing;
pub mod fetch;
pub mod object_store;
pub mod upload;
pub mod video;

use async_trait::async_trait;

use snap2listing_shared::{Result, Snap2ListingError};

pub use billing::{BillingPortal, StripeBillingPortal};
pub use fetch::{DEFAULT_MAX_DOWNLOAD_BYTES, FetchedImage, HttpImageFetcher, ImageFetcher};
pub use object_store::{HttpObjectStore, ObjectStore};
pub use upload::{DecodedImage, decode_image, object_key};
pub use video::{FalVideoGenerator, GeneratedVideo, VideoGenerator, VideoRequest};

/// User-Agent string for outbound requests.
pub(crate) const USER_AGENT: &str = concat!("Snap2Listing/", env!("CARGO_PKG_VERSION"));

/// Stand-in for a service whose credentials are not configured.
///
/// Every call fails with a config error naming the missing service.
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured(pub &'static str);

impl Unconfigured {
    fn error(&self) -> Snap2ListingError {
        Snap2ListingError::config(format!("{} is not configured", self.0))
    }
}

#[async_trait]
impl BillingPortal for Unconfigured {
    async fn create_session(&self, _customer_id: &str) -> Result<String> {
        Err(self.error())
    }
}

#[async_trait]
impl ObjectStore for Unconfigured {
    async fn put(&self, _key: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        Err(self.error())
    }
}

#[async_trait]
impl VideoGenerator for Unconfigured {
    async fn generate(&self, _request: &VideoRequest) -> Result<GeneratedVideo> {
        Err(self.error())
    }
}
