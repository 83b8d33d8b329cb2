//! HTTP routes.

mod media;
mod seo;
mod video;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::error::{ApiError, required};
use crate::state::SharedState;

/// Where clients of retired endpoints are sent.
pub const MIGRATION_TARGET: &str = "/app/channels";

/// Build the router with every endpoint.
///
/// `body_limit` caps request bodies in bytes (uploads arrive as base64 JSON).
pub fn router(state: SharedState, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/channels", get(list_channels))
        .route("/api/download-image", get(media::download))
        .route("/api/upload", post(media::upload))
        .route("/api/etsy/auth", get(gone))
        .route("/api/etsy/callback", get(gone))
        .route("/api/etsy/publish", post(gone))
        .route("/api/generate-video", post(video::generate))
        .route("/api/generate-video-status", get(video::status))
        .route("/api/seo/keywords", post(seo::keywords))
        .route("/api/seo/draft", post(seo::draft))
        .route("/api/seo/optimize", post(seo::optimize))
        .route("/api/stripe/portal", post(stripe_portal))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[instrument(skip_all)]
async fn list_channels(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let channels = state
        .storage
        .list_channels()
        .await
        .map_err(ApiError::internal("Failed to fetch channels"))?;

    Ok(Json(json!({ "success": true, "channels": channels })))
}

/// Retired direct-Etsy endpoints: still routed, always 410.
async fn gone() -> Response {
    info!("retired Etsy endpoint called");
    (
        StatusCode::GONE,
        Json(json!({
            "success": false,
            "error": "Direct Etsy integration has been retired.",
            "migration": {
                "message": "Connect your sales channels and export listings from the Channels page.",
                "next": MIGRATION_TARGET,
            },
        })),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortalRequest {
    #[serde(default)]
    customer_id: String,
}

#[instrument(skip_all)]
async fn stripe_portal(
    State(state): State<SharedState>,
    payload: Result<Json<PortalRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let customer_id = required("customerId", &request.customer_id)?;

    let url = state
        .billing
        .create_session(customer_id)
        .await
        .map_err(ApiError::internal("Failed to create billing portal session"))?;

    Ok(Json(json!({ "url": url })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;
    use uuid::Uuid;

    use snap2listing_integrations::{
        BillingPortal, FetchedImage, GeneratedVideo, ImageFetcher, ObjectStore, VideoGenerator,
        VideoRequest,
    };
    use snap2listing_seo::{KeywordEngine, SeoBrain, SuggestionSource, TemplateCopyModel};
    use snap2listing_shared::{Result, Snap2ListingError, usage_period};
    use snap2listing_storage::{Storage, VIDEO_RESOURCE};

    use super::*;
    use crate::state::{AppState, Limits};

    // -- fakes --------------------------------------------------------------

    /// Every query gets 25 distinct completions.
    struct FloodSuggestions;

    #[async_trait]
    impl SuggestionSource for FloodSuggestions {
        fn name(&self) -> &str {
            "flood"
        }

        async fn suggest(&self, query: &str) -> Result<Vec<String>> {
            Ok((0..25).map(|i| format!("{query} style {i}")).collect())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn put(&self, key: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://storage.test/{key}"))
        }
    }

    #[derive(Default)]
    struct FakeVideo {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl VideoGenerator for FakeVideo {
        async fn generate(&self, _request: &VideoRequest) -> Result<GeneratedVideo> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Snap2ListingError::Upstream {
                    service: "fal",
                    status: 502,
                    message: "bad gateway".into(),
                });
            }
            Ok(GeneratedVideo {
                request_id: format!("req-{n}"),
                url: format!("https://cdn.test/video-{n}.mp4"),
            })
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("127.0.0.1") {
                return Err(Snap2ListingError::validation("url targets a disallowed host"));
            }
            Ok(FetchedImage {
                bytes: vec![0x89, b'P', b'N', b'G'],
                content_type: "image/png".into(),
                file_name: "mug.png".into(),
            })
        }
    }

    struct FakeBilling;

    #[async_trait]
    impl BillingPortal for FakeBilling {
        async fn create_session(&self, customer_id: &str) -> Result<String> {
            Ok(format!("https://billing.test/session/{customer_id}"))
        }
    }

    struct Harness {
        state: SharedState,
        store: Arc<FakeStore>,
        video: Arc<FakeVideo>,
        fetcher: Arc<FakeFetcher>,
    }

    impl Harness {
        async fn new() -> Self {
            let tmp = std::env::temp_dir().join(format!("s2l_server_test_{}.db", Uuid::now_v7()));
            let storage = Storage::open(&tmp).await.expect("open test db");

            let keywords = Arc::new(KeywordEngine::new(Arc::new(FloodSuggestions)));
            let brain = SeoBrain::new(Arc::new(TemplateCopyModel), keywords.clone());
            let store = Arc::new(FakeStore::default());
            let video = Arc::new(FakeVideo::default());
            let fetcher = Arc::new(FakeFetcher::default());

            let state = Arc::new(AppState {
                storage,
                keywords,
                brain,
                billing: Arc::new(FakeBilling),
                objects: store.clone(),
                video: video.clone(),
                fetcher: fetcher.clone(),
                limits: Limits {
                    video_monthly_limit: 3,
                    video_status_delay: Duration::ZERO,
                    max_upload_bytes: 1024 * 1024,
                },
            });

            Self {
                state,
                store,
                video,
                fetcher,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = router(self.state.clone(), 4 * 1024 * 1024)
                .oneshot(request)
                .await
                .expect("router response");
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("read body");
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.send(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }
    }

    fn video_body(user: &str) -> Value {
        json!({
            "baseImageUrl": "https://cdn.test/mug.jpg",
            "prompt": "slow turntable spin",
            "userId": user,
        })
    }

    // -- tests --------------------------------------------------------------

    #[tokio::test]
    async fn health_reports_version() {
        let h = Harness::new().await;
        let (status, body) = h.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn retired_endpoints_return_gone_with_migration() {
        let h = Harness::new().await;

        for (status, body) in [
            h.get("/api/etsy/auth").await,
            h.get("/api/etsy/callback?code=abc&state=xyz").await,
            h.post("/api/etsy/publish", json!({"listingId": 1})).await,
        ] {
            assert_eq!(status, StatusCode::GONE);
            assert_eq!(body["success"], false);
            assert_eq!(body["migration"]["next"], MIGRATION_TARGET);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn channels_sorted_by_name() {
        let h = Harness::new().await;
        h.state
            .storage
            .insert_channel("Ai Market", "ai-market", None)
            .await
            .unwrap();

        let (status, body) = h.get("/api/channels").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let names: Vec<String> = body["channels"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap().to_string())
            .collect();
        let mut sorted = names.clone();
        sorted.sort_by_key(|n| n.to_lowercase());
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 5);
    }

    #[tokio::test]
    async fn upload_without_image_never_touches_store() {
        let h = Harness::new().await;

        let (status, body) = h.post("/api/upload", json!({"fileName": "mug.png"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "image is required");
        assert_eq!(h.store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upload_stores_decoded_image() {
        let h = Harness::new().await;

        let (status, body) = h
            .post(
                "/api/upload",
                json!({"image": "data:image/png;base64,iVBORw0KGgo=", "fileName": "mug.png"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let url = body["url"].as_str().unwrap();
        assert!(url.starts_with("https://storage.test/uploads/"));
        assert!(url.ends_with("-mug.png"));
        assert_eq!(h.store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upload_refuses_html_payload() {
        let h = Harness::new().await;

        // "<html></html>" in base64.
        let (status, body) = h
            .post(
                "/api/upload",
                json!({"image": "data:text/html;base64,PGh0bWw+PC9odG1sPg==", "fileName": "x.html"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(h.store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let h = Harness::new().await;
        let (status, body) = h
            .send(
                Request::post("/api/seo/optimize")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn video_quota_exhausted_skips_provider() {
        let h = Harness::new().await;
        h.state
            .storage
            .set_user_limit("user-free", VIDEO_RESOURCE, 0)
            .await
            .unwrap();

        let (status, body) = h.post("/api/generate-video", video_body("user-free")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("Upgrade"));
        assert_eq!(h.video.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn video_quota_counts_each_success() {
        let h = Harness::new().await;

        for _ in 0..3 {
            let (status, body) = h.post("/api/generate-video", video_body("user-1")).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "completed");
            assert_eq!(body["progress"], 100);
        }

        let (status, _) = h.post("/api/generate-video", video_body("user-1")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(h.video.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn provider_failure_releases_quota() {
        let h = Harness::new().await;
        h.video.fail.store(true, Ordering::SeqCst);

        let (status, body) = h.post("/api/generate-video", video_body("user-2")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to generate video");

        let period = usage_period(chrono::Utc::now());
        let usage = h
            .state
            .storage
            .get_usage("user-2", VIDEO_RESOURCE, &period, 3)
            .await
            .unwrap();
        assert_eq!(usage.used, 0);
    }

    #[tokio::test]
    async fn video_requires_all_fields() {
        let h = Harness::new().await;
        let (status, body) = h
            .post("/api/generate-video", json!({"prompt": "spin", "userId": "u"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "baseImageUrl is required");
    }

    #[tokio::test]
    async fn video_status_lookup() {
        let h = Harness::new().await;

        let (status, _) = h.get("/api/generate-video-status").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = h.get("/api/generate-video-status?requestId=missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, created) = h.post("/api/generate-video", video_body("user-3")).await;
        let request_id = created["requestId"].as_str().unwrap();
        let (status, body) = h
            .get(&format!("/api/generate-video-status?requestId={request_id}"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["url"], created["url"]);
        assert_eq!(body["id"], created["id"]);
    }

    #[tokio::test]
    async fn keyword_analysis_never_exceeds_cap() {
        let h = Harness::new().await;

        let (status, body) = h
            .post(
                "/api/seo/keywords",
                json!({
                    "productTitle": "Handmade Ceramic Coffee Mug with Speckled Glaze",
                    "productDescription": "Wheel-thrown stoneware mug. Speckled glaze, dishwasher safe. Great gift for coffee lovers.",
                    "category": "Home & Living > Kitchen & Dining > Drinkware",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let data = &body["data"];
        assert!(data["grouped"].as_object().is_some_and(|g| !g.is_empty()));
        assert!(data["autosuggests"].as_array().unwrap().len() <= 10);
        assert!(data["analysis"]["keywords"].as_array().unwrap().len() <= 30);
        assert!(data["analysis"]["summary"]["total"].as_u64().unwrap() <= 30);
    }

    #[tokio::test]
    async fn keywords_require_title() {
        let h = Harness::new().await;
        let (status, body) = h
            .post(
                "/api/seo/keywords",
                json!({"productDescription": "mug", "category": "Kitchen"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "productTitle is required");
    }

    #[tokio::test]
    async fn draft_and_optimize_round() {
        let h = Harness::new().await;

        let (status, body) = h
            .post(
                "/api/seo/draft",
                json!({
                    "productImage": "https://cdn.test/mug.jpg",
                    "shortDescription": "Handmade ceramic coffee mug",
                    "category": "Kitchen & Dining",
                    "channels": ["etsy", "ebay"],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let draft = &body["data"];
        for key in ["id", "productImage", "shortDescription", "category", "keywords", "model", "createdAt"] {
            assert!(!draft[key].is_null(), "draft is missing {key}");
        }
        assert_eq!(draft["productImage"], "https://cdn.test/mug.jpg");
        let etsy = &draft["channels"]["etsy"];
        assert!(etsy["tags"].as_array().unwrap().len() <= 13);

        let (status, body) = h
            .post(
                "/api/seo/optimize",
                json!({
                    "currentContent": etsy,
                    "targetKeywords": ["speckled coffee mug"],
                    "channels": ["etsy"],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let optimized = &body["data"]["channels"]["etsy"];
        assert_eq!(optimized["coverageAfter"]["ratio"], 1.0);
        assert!(optimized["changes"].is_array());
        assert_eq!(body["data"]["targetKeywords"], json!(["speckled coffee mug"]));
        assert!(body["data"].get("listings").is_none());
        assert_eq!(body["data"]["focusAreas"], json!(["title", "description", "tags"]));
    }

    #[tokio::test]
    async fn draft_rejects_missing_and_unknown_channels() {
        let h = Harness::new().await;
        let base = json!({
            "productImage": "https://cdn.test/mug.jpg",
            "shortDescription": "Handmade ceramic coffee mug",
            "category": "Kitchen",
        });

        let (status, body) = h.post("/api/seo/draft", base.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "channels is required");

        let mut unknown = base;
        unknown["channels"] = json!(["myspace"]);
        let (status, body) = h.post("/api/seo/draft", unknown).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("myspace"));
    }

    #[tokio::test]
    async fn download_requires_url_and_skips_fetch() {
        let h = Harness::new().await;

        let (status, body) = h.get("/api/download-image").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "url is required");
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn download_proxies_as_attachment() {
        let h = Harness::new().await;

        let response = router(h.state.clone(), 1024)
            .oneshot(
                Request::get("/api/download-image?url=https%3A%2F%2Fcdn.test%2Fmug.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"mug.png\""
        );
    }

    #[tokio::test]
    async fn download_disallowed_host_is_bad_request() {
        let h = Harness::new().await;
        let (status, _) = h
            .get("/api/download-image?url=http%3A%2F%2F127.0.0.1%2Fx.png")
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stripe_portal_round() {
        let h = Harness::new().await;

        let (status, _) = h.post("/api/stripe/portal", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = h
            .post("/api/stripe/portal", json!({"customerId": "cus_42"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "https://billing.test/session/cus_42");
    }
}
