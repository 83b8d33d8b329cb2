//! `/api/seo/*`: keyword research, drafts, optimization.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use snap2listing_seo::{DraftRequest, OptimizeRequest};

use crate::error::{ApiError, required};
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordsRequest {
    #[serde(default)]
    pub product_title: String,
    #[serde(default)]
    pub product_description: String,
    #[serde(default)]
    pub category: String,
}

#[instrument(skip_all)]
pub async fn keywords(
    State(state): State<SharedState>,
    payload: Result<Json<KeywordsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let title = required("productTitle", &request.product_title)?;
    let description = required("productDescription", &request.product_description)?;

    let research = state
        .keywords
        .research(title, description, request.category.trim())
        .await
        .map_err(ApiError::from_domain("Failed to research keywords"))?;

    Ok(Json(json!({ "success": true, "data": research })))
}

#[instrument(skip_all)]
pub async fn draft(
    State(state): State<SharedState>,
    payload: Result<Json<DraftRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    required("productImage", &request.product_image)?;
    required("shortDescription", &request.short_description)?;
    required("category", &request.category)?;
    if request.channels.is_empty() {
        return Err(ApiError::bad_request("channels is required"));
    }

    let draft = state
        .brain
        .generate_draft(&request)
        .await
        .map_err(ApiError::from_domain("Failed to generate draft"))?;

    Ok(Json(json!({ "success": true, "data": draft })))
}

#[instrument(skip_all)]
pub async fn optimize(
    State(state): State<SharedState>,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    if request.target_keywords.is_empty() {
        return Err(ApiError::bad_request("targetKeywords is required"));
    }
    if request.channels.is_empty() {
        return Err(ApiError::bad_request("channels is required"));
    }

    let result = state
        .brain
        .optimize(&request)
        .await
        .map_err(ApiError::from_domain("Failed to optimize listing"))?;

    Ok(Json(json!({ "success": true, "data": result })))
}
