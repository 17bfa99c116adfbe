//! Assessment submission endpoint
//!
//! Runs the whole pipeline for one submitted assessment: validate the
//! payload, normalize and price the line items, upload the sketch and
//! photos, assemble the worksheet layout, and commit it as a fresh
//! document. Partial asset failures are reported in the response but do
//! not fail the submission; catastrophic failures (destination
//! unreachable, permission denied) fail it whole.

use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::api::DataResponse;
use crate::app::AppState;
use crate::domain::assessment::{SubmissionRequest, SubmissionResponse};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequestIdExt;
use crate::pipeline::commit::{commit, sanitize_document_name};
use crate::pipeline::layout::assemble;
use crate::pipeline::normalize::normalize;
use crate::pipeline::upload::{upload_assets, UploadOptions};

#[instrument(skip(state, headers, payload), fields(work_order = %payload.header.work_order))]
pub async fn submit_assessment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SubmissionRequest>,
) -> ApiResult<DataResponse<SubmissionResponse>> {
    if let Some(request_id) = headers.request_id() {
        info!(request_id, "assessment submission received");
    }

    validate(&payload)?;

    let normalized = normalize(&payload.items);
    if normalized.items.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "no valid work items in submission ({} rejected)",
            normalized.skipped.len()
        )));
    }

    // One batch for sketch + photos so they share folder resolution and
    // pacing. The sketch, when present, is always first.
    let mut assets = Vec::with_capacity(payload.photos.len() + 1);
    if let Some(sketch) = &payload.sketch {
        assets.push(sketch.clone());
    }
    assets.extend(payload.photos.iter().cloned());

    let folder_name = sanitize_document_name(&payload.header.work_order);
    let options = UploadOptions {
        per_asset_timeout: state.settings.upload_timeout(),
        pacing: state.settings.upload_pacing(),
    };
    let mut outcomes =
        upload_assets(state.backend.as_ref(), &folder_name, &assets, options).await;

    let sketch_outcome = payload.sketch.is_some().then(|| outcomes.remove(0));
    let photo_outcomes = outcomes;

    let sketch_asset = sketch_outcome.as_ref().and_then(|o| o.uploaded());
    let photo_assets: Vec<_> = photo_outcomes
        .iter()
        .filter_map(|o| o.uploaded())
        .cloned()
        .collect();

    let plan = assemble(
        &payload.header,
        &payload.scope,
        sketch_asset,
        &normalized.items,
        &photo_assets,
    );

    let document = commit(
        state.backend.as_ref(),
        &state.locks,
        &plan,
        &payload.header.work_order,
    )
    .await?;

    info!(
        work_order = %payload.header.work_order,
        items = normalized.items.len(),
        photos_uploaded = photo_assets.len(),
        photos_failed = photo_outcomes.len() - photo_assets.len(),
        document_url = %document.url,
        "assessment committed"
    );

    Ok(DataResponse::new(SubmissionResponse {
        success: true,
        document_url: document.url,
        sketch: sketch_outcome,
        photos: photo_outcomes,
        skipped_items: normalized.skipped,
    }))
}

/// Structural validation before any work happens. Failures name the field
/// instead of surfacing from deep inside layout math.
fn validate(payload: &SubmissionRequest) -> ApiResult<()> {
    if payload.items.is_empty() {
        return Err(ApiError::BadRequest(
            "submission has no work items".to_string(),
        ));
    }
    if payload.header.unit_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "header is missing 'unit_id'".to_string(),
        ));
    }
    if payload.header.address.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "header is missing 'address'".to_string(),
        ));
    }
    Ok(())
}
