//! Image upload and the download proxy.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use snap2listing_integrations::{decode_image, object_key};

use crate::error::{ApiError, required};
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
}

#[instrument(skip_all)]
pub async fn upload(
    State(state): State<SharedState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let image = required("image", &request.image)?;

    let decoded = decode_image(image, state.limits.max_upload_bytes)
        .map_err(ApiError::from_domain("Failed to decode image"))?;
    let key = object_key(request.file_name.as_deref(), &decoded, Utc::now());
    let size = decoded.bytes.len();

    let url = state
        .objects
        .put(&key, decoded.bytes, &decoded.content_type)
        .await
        .map_err(ApiError::internal("Failed to upload image"))?;

    info!(%key, size, "image uploaded");
    Ok(Json(json!({ "url": url })))
}

#[instrument(skip_all)]
pub async fn download(
    State(state): State<SharedState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let url = required("url", query.url.as_deref().unwrap_or_default())?;

    let image = state
        .fetcher
        .fetch(url)
        .await
        .map_err(ApiError::from_domain("Failed to download image"))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        image.file_name.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        image.bytes,
    )
        .into_response())
}
