//! Asset uploader
//!
//! Persists a submission's sketch and photos into the asset store, one
//! folder per work order. Outcomes are isolated per asset: a decode
//! failure, API error, or timeout marks that asset failed and the batch
//! moves on, so the result set always has the same length as the input.
//! Uploads run sequentially with a pacing delay between them to stay under
//! the store's rate limits.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::{instrument, warn};

use crate::domain::assessment::{AssetOutcome, AssetUpload, UploadedAsset};
use crate::services::backend::{AssessmentBackend, BackendError};

/// Pacing and timeout knobs, taken from [`Settings`](crate::config::Settings).
#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Bound on one asset's transfer; a hung upload fails instead of
    /// stalling the submission.
    pub per_asset_timeout: Duration,
    /// Delay inserted between sequential uploads in a batch.
    pub pacing: Duration,
}

/// Decoded image payload ready for the store.
struct DecodedAsset {
    bytes: Vec<u8>,
    mime_type: String,
}

/// Upload every asset in `assets` into the work order's folder.
///
/// The folder is resolved once per batch; the backend guarantees the
/// resolution is idempotent, so resubmissions group their assets together.
/// If the folder itself cannot be resolved, every asset in the batch is
/// reported failed (still one outcome per input).
#[instrument(skip(backend, assets, options), fields(count = assets.len()))]
pub async fn upload_assets(
    backend: &dyn AssessmentBackend,
    work_order_folder: &str,
    assets: &[AssetUpload],
    options: UploadOptions,
) -> Vec<AssetOutcome> {
    if assets.is_empty() {
        return Vec::new();
    }

    let folder_id = match backend.ensure_folder(work_order_folder).await {
        Ok(id) => id,
        Err(e) => {
            warn!(folder = work_order_folder, error = %e, "asset folder unavailable");
            return assets
                .iter()
                .map(|a| AssetOutcome::Failed {
                    name: a.name.clone(),
                    error: format!("asset folder unavailable: {e}"),
                })
                .collect();
        }
    };

    let mut outcomes = Vec::with_capacity(assets.len());
    for (idx, asset) in assets.iter().enumerate() {
        if idx > 0 {
            tokio::time::sleep(options.pacing).await;
        }
        outcomes.push(upload_one(backend, &folder_id, asset, options.per_asset_timeout).await);
    }
    outcomes
}

async fn upload_one(
    backend: &dyn AssessmentBackend,
    folder_id: &str,
    asset: &AssetUpload,
    timeout: Duration,
) -> AssetOutcome {
    let decoded = match decode_payload(&asset.data) {
        Ok(d) => d,
        Err(e) => {
            warn!(asset = %asset.name, error = %e, "asset payload rejected");
            return AssetOutcome::Failed {
                name: asset.name.clone(),
                error: e.to_string(),
            };
        }
    };

    let upload = backend.upload_file(folder_id, &asset.name, &decoded.mime_type, decoded.bytes);
    match tokio::time::timeout(timeout, upload).await {
        Ok(Ok(url)) => AssetOutcome::Uploaded(UploadedAsset {
            name: asset.name.clone(),
            url,
            caption: asset.caption.clone(),
        }),
        Ok(Err(e)) => {
            warn!(asset = %asset.name, error = %e, "asset upload failed");
            AssetOutcome::Failed {
                name: asset.name.clone(),
                error: e.to_string(),
            }
        }
        Err(_) => {
            warn!(asset = %asset.name, timeout_secs = timeout.as_secs(), "asset upload timed out");
            AssetOutcome::Failed {
                name: asset.name.clone(),
                error: format!("upload timed out after {}s", timeout.as_secs()),
            }
        }
    }
}

/// Decode a base64 image payload, with or without a `data:<mime>;base64,`
/// prefix. The prefix's MIME type wins; bare payloads default to PNG.
fn decode_payload(data: &str) -> Result<DecodedAsset, BackendError> {
    let (mime_type, encoded) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (mime, payload) = rest.split_once(";base64,").ok_or_else(|| {
                BackendError::InvalidAssetFormat("data URL is not base64-encoded".to_string())
            })?;
            (mime.to_string(), payload)
        }
        None => ("image/png".to_string(), data),
    };

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| BackendError::InvalidAssetFormat(format!("malformed base64 payload: {e}")))?;

    if bytes.is_empty() {
        return Err(BackendError::InvalidAssetFormat("empty image payload".to_string()));
    }

    Ok(DecodedAsset { bytes, mime_type })
}
