//! Remote image fetching for the download proxy.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::Policy;
use tracing::{debug, instrument};
use url::Url;

use snap2listing_shared::{Result, Snap2ListingError};

use crate::USER_AGENT;
use crate::upload::{extension_for, sanitize_file_name};

/// Largest body the proxy will relay.
pub const DEFAULT_MAX_DOWNLOAD_BYTES: usize = 20 * 1024 * 1024;

/// A fetched remote file.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Attachment file name derived from the URL and content type.
    pub file_name: String,
}

/// Fetches a remote image by URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Disallowed or malformed URLs fail with a validation error before any
    /// request is made.
    async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

/// HTTP fetcher with an SSRF guard and a response-size cap.
pub struct HttpImageFetcher {
    client: Client,
    max_bytes: usize,
    allow_private: bool,
}

impl HttpImageFetcher {
    pub fn new(max_bytes: usize, allow_private: bool) -> Result<Self> {
        // Redirects are re-checked so a public URL cannot bounce to a private host.
        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() >= 5 {
                attempt.error("too many redirects")
            } else if !allow_private && is_ssrf_target(attempt.url()) {
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(policy)
            .timeout(Duration::from_secs(30));
        if !allow_private {
            builder = builder.dns_resolver(Arc::new(PublicOnlyResolver));
        }
        let client = builder
            .build()
            .map_err(|e| Snap2ListingError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_bytes,
            allow_private,
        })
    }

    async fn check_url(&self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw.trim())
            .map_err(|e| Snap2ListingError::validation(format!("url is not valid: {e}")))?;
        if self.allow_private {
            return Ok(url);
        }
        if is_ssrf_target(&url) {
            return Err(Snap2ListingError::validation("url targets a disallowed host"));
        }
        if let Some(url::Host::Domain(host)) = url.host() {
            public_addrs(host, url.port_or_known_default().unwrap_or(80)).await?;
        }
        Ok(url)
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        let url = self.check_url(url).await?;

        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| Snap2ListingError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Snap2ListingError::Upstream {
                service: "image host",
                status: status.as_u16(),
                message: format!("fetching {url}"),
            });
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(Snap2ListingError::Network(format!(
                "{url}: body exceeds {} bytes",
                self.max_bytes
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Snap2ListingError::Network(format!("{url}: body read failed: {e}")))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(Snap2ListingError::Network(format!(
                    "{url}: body exceeds {} bytes",
                    self.max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        let file_name = derive_file_name(&url, &content_type);
        debug!(bytes = bytes.len(), %content_type, %file_name, "image fetched");

        Ok(FetchedImage {
            bytes,
            content_type,
            file_name,
        })
    }
}

/// Last path segment when it has an extension, else `image.<ext>`.
fn derive_file_name(url: &Url, content_type: &str) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(sanitize_file_name)
        .unwrap_or_default();

    if segment.contains('.') {
        segment
    } else if segment.is_empty() {
        format!("image.{}", extension_for(content_type))
    } else {
        format!("{segment}.{}", extension_for(content_type))
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            let host = host.trim_end_matches('.').to_ascii_lowercase();
            host == "localhost"
                || host.ends_with(".localhost")
                || host.ends_with(".local")
                || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Resolve `host` and fail unless every address is public.
async fn public_addrs(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Snap2ListingError::Network(format!("could not resolve {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(Snap2ListingError::Network(format!("{host} has no addresses")));
    }
    if addrs.iter().any(|addr| is_private_ip(&addr.ip())) {
        debug!(host, "host resolves to a private address");
        return Err(Snap2ListingError::validation("url targets a disallowed host"));
    }
    Ok(addrs)
}

/// Connection-time resolver for the proxy client.
///
/// The client connects only to addresses vetted here, so a host that
/// answers with a public address during [`HttpImageFetcher::check_url`] and
/// a private one afterwards is still refused.
struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let addrs = public_addrs(name.as_str(), 0).await?;
            Ok::<Addrs, Box<dyn std::error::Error + Send + Sync>>(Box::new(addrs.into_iter()))
        })
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (octets[0] == 192 && octets[1] == 0 && octets[2] == 0)
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (first & 0xFE00) == 0xFC00
                // fe80::/10 link local
                || (first & 0xFFC0) == 0xFE80
        }
    }
}
