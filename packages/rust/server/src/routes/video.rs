//! Video generation with a monthly per-user quota.
//!
//! Quota is reserved before the provider is called and released again if
//! the provider fails, so a user is only charged for videos they received.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use snap2listing_integrations::VideoRequest;
use snap2listing_shared::{VideoJob, VideoStatus, usage_period};
use snap2listing_storage::VIDEO_RESOURCE;

use crate::error::{ApiError, required};
use crate::state::SharedState;

const LIMIT_REACHED: &str =
    "Monthly video limit reached. Upgrade your plan to generate more videos.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoRequest {
    #[serde(default)]
    pub base_image_url: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub request_id: Option<String>,
}

#[instrument(skip_all)]
pub async fn generate(
    State(state): State<SharedState>,
    payload: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let base_image_url = required("baseImageUrl", &request.base_image_url)?;
    let prompt = required("prompt", &request.prompt)?;
    let user_id = required("userId", &request.user_id)?;

    let period = usage_period(Utc::now());
    let reserved = state
        .storage
        .reserve_quota(
            user_id,
            VIDEO_RESOURCE,
            &period,
            state.limits.video_monthly_limit,
        )
        .await
        .map_err(ApiError::internal("Failed to check usage limits"))?;

    if !reserved {
        warn!(user_id, %period, "video quota exhausted");
        return Err(ApiError::Forbidden(LIMIT_REACHED.to_string()));
    }

    let started = Utc::now();
    let outcome = state
        .video
        .generate(&VideoRequest {
            prompt: prompt.to_string(),
            image_url: base_image_url.to_string(),
        })
        .await;

    let mut job = VideoJob {
        id: Uuid::now_v7().to_string(),
        request_id: String::new(),
        user_id: user_id.to_string(),
        prompt: prompt.to_string(),
        base_image_url: base_image_url.to_string(),
        status: VideoStatus::Completed,
        url: None,
        progress: 100,
        error: None,
        created_at: started,
        updated_at: Utc::now(),
    };

    match outcome {
        Ok(video) => {
            job.request_id = video.request_id;
            job.url = Some(video.url);

            // The video exists and the quota is spent; a bookkeeping failure
            // only costs the status lookup.
            if let Err(e) = state.storage.upsert_video_job(&job).await {
                error!(error = %e, request_id = %job.request_id, "failed to record video job");
            }

            info!(user_id, request_id = %job.request_id, "video generated");
            Ok(Json(json!({
                "id": job.id,
                "requestId": job.request_id,
                "status": job.status,
                "url": job.url,
                "progress": job.progress,
            })))
        }
        Err(source) => {
            if let Err(e) = state
                .storage
                .release_quota(user_id, VIDEO_RESOURCE, &period)
                .await
            {
                error!(error = %e, user_id, "failed to release video quota");
            }

            job.request_id = Uuid::now_v7().to_string();
            job.status = VideoStatus::Failed;
            job.progress = 0;
            job.error = Some(source.to_string());
            if let Err(e) = state.storage.upsert_video_job(&job).await {
                error!(error = %e, "failed to record failed video job");
            }

            Err(ApiError::internal("Failed to generate video")(source))
        }
    }
}

#[instrument(skip_all)]
pub async fn status(
    State(state): State<SharedState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let request_id = required("requestId", query.request_id.as_deref().unwrap_or_default())?;

    if !state.limits.video_status_delay.is_zero() {
        tokio::time::sleep(state.limits.video_status_delay).await;
    }

    let job = state
        .storage
        .get_video_job(request_id)
        .await
        .map_err(ApiError::internal("Failed to fetch video status"))?
        .ok_or_else(|| ApiError::NotFound(format!("No video request with id {request_id}")))?;

    Ok(Json(json!({
        "id": job.id,
        "status": job.status,
        "url": job.url,
        "progress": job.progress,
    })))
}
