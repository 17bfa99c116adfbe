//! Google Drive / Sheets backend
//!
//! The production [`AssessmentBackend`]: assets go to Drive v3 with a
//! public-reader grant, worksheets are Sheets v4 spreadsheets written
//! through a single `batchUpdate` per directive batch. Transient API
//! failures (429, 5xx) are retried with exponential backoff; authorization
//! and not-found responses are mapped to their own error variants so the
//! caller can tell an expired token from a missing container.

use anyhow::{Context, Result};
use backoff::{future::retry, ExponentialBackoffBuilder};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, instrument};

use super::backend::{AssessmentBackend, BackendError, DocumentHandle};
use crate::pipeline::commit::WriteBatch;
use crate::pipeline::layout::{
    CellFormat, GridRange, HorizontalAlign, NumberFormat, Payload, RowHeight,
};

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const MULTIPART_BOUNDARY: &str = "fieldsheet_asset_boundary";

/// Client for the Drive and Sheets APIs.
#[derive(Clone)]
pub struct GoogleBackend {
    client: Client,
    drive_url: String,
    drive_upload_url: String,
    sheets_url: String,
    access_token: String,
    /// Parent folder all work-order folders are created under.
    root_folder_id: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

impl GoogleBackend {
    pub fn new(
        drive_url: &str,
        drive_upload_url: &str,
        sheets_url: &str,
        access_token: &str,
        root_folder_id: &str,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(root_folder = root_folder_id, "Google backend initialized");

        Ok(Self {
            client,
            drive_url: drive_url.trim_end_matches('/').to_string(),
            drive_upload_url: drive_upload_url.trim_end_matches('/').to_string(),
            sheets_url: sheets_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            root_folder_id: root_folder_id.to_string(),
        })
    }

    /// Send one authorized request, retrying transient failures. 429 and
    /// 5xx are retried; everything else maps straight to a `BackendError`.
    async fn send(
        &self,
        service: &'static str,
        method: Method,
        url: &str,
        body: Option<Value>,
        content_type: Option<(&'static str, String)>,
    ) -> Result<Value, BackendError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_elapsed_time(Some(Duration::from_secs(20)))
            .build();

        // Reference shadows so the retry closure copies cheap borrows into
        // each attempt's future instead of consuming the request parts.
        let method = &method;
        let body = &body;
        let content_type = &content_type;

        retry(policy, || async move {
            let mut req = self
                .client
                .request(method.clone(), url)
                .bearer_auth(&self.access_token);

            req = match (body, content_type) {
                (_, Some((mime, raw))) => req
                    .header("Content-Type", *mime)
                    .body(raw.clone()),
                (Some(json_body), None) => req.json(json_body),
                (None, None) => req,
            };

            debug!(service, url, "google API request");

            let response = req.send().await.map_err(|e| {
                error!(service, error = %e, "google API unreachable");
                backoff::Error::transient(BackendError::Unavailable(e.to_string()))
            })?;

            let status = response.status();
            if status.is_success() {
                let value = response.json::<Value>().await.unwrap_or(Value::Null);
                return Ok(value);
            }

            let message = response
                .json::<GoogleErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("{service} API error"));

            let err = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    BackendError::PermissionDenied(message)
                }
                StatusCode::NOT_FOUND => BackendError::NotFound(message),
                s => BackendError::Api {
                    service,
                    status: s.as_u16(),
                    message,
                },
            };

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            }
        })
        .await
    }

    async fn drive_search(&self, query: &str) -> Result<Vec<String>, BackendError> {
        let url = format!(
            "{}/files?q={}&fields=files(id)",
            self.drive_url,
            urlencode(query)
        );
        let body = self.send("drive", Method::GET, &url, None, None).await?;

        Ok(body["files"]
            .as_array()
            .map(|files| {
                files
                    .iter()
                    .filter_map(|f| f["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn grant_public_read(&self, file_id: &str) -> Result<(), BackendError> {
        let url = format!("{}/files/{}/permissions", self.drive_url, file_id);
        self.send(
            "drive",
            Method::POST,
            &url,
            Some(json!({ "role": "reader", "type": "anyone" })),
            None,
        )
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AssessmentBackend for GoogleBackend {
    #[instrument(skip(self))]
    async fn ensure_folder(&self, name: &str) -> Result<String, BackendError> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and '{}' in parents and trashed = false",
            name.replace('\'', "\\'"),
            FOLDER_MIME,
            self.root_folder_id
        );
        if let Some(id) = self.drive_search(&query).await?.into_iter().next() {
            debug!(folder = name, id = %id, "reusing existing asset folder");
            return Ok(id);
        }

        let url = format!("{}/files", self.drive_url);
        let body = self
            .send(
                "drive",
                Method::POST,
                &url,
                Some(json!({
                    "name": name,
                    "mimeType": FOLDER_MIME,
                    "parents": [self.root_folder_id],
                })),
                None,
            )
            .await?;

        body["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BackendError::Unavailable("folder create returned no id".to_string()))
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BackendError> {
        // multipart/related upload: metadata part + base64 media part.
        let metadata = json!({ "name": name, "parents": [folder_id] });
        let body = format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
             --{b}\r\nContent-Type: {mime}\r\nContent-Transfer-Encoding: base64\r\n\r\n{data}\r\n\
             --{b}--",
            b = MULTIPART_BOUNDARY,
            meta = metadata,
            mime = mime_type,
            data = BASE64.encode(&bytes),
        );

        let url = format!("{}/files?uploadType=multipart", self.drive_upload_url);
        let response = self
            .send(
                "drive",
                Method::POST,
                &url,
                None,
                Some((
                    "multipart/related; boundary=fieldsheet_asset_boundary",
                    body,
                )),
            )
            .await?;

        let file_id = response["id"]
            .as_str()
            .ok_or_else(|| BackendError::Unavailable("upload returned no file id".to_string()))?
            .to_string();

        self.grant_public_read(&file_id).await?;

        // Direct-view URL, embeddable by the image formula.
        Ok(format!(
            "https://drive.google.com/uc?export=view&id={file_id}"
        ))
    }

    #[instrument(skip(self))]
    async fn delete_document_by_name(&self, name: &str) -> Result<(), BackendError> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            name.replace('\'', "\\'"),
            SPREADSHEET_MIME
        );
        for file_id in self.drive_search(&query).await? {
            debug!(document = name, id = %file_id, "deleting prior document");
            let url = format!("{}/files/{}", self.drive_url, file_id);
            match self.send("drive", Method::DELETE, &url, None, None).await {
                Ok(_) => {}
                // Already gone is fine; replace semantics only need absence.
                Err(BackendError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_document(&self, name: &str) -> Result<DocumentHandle, BackendError> {
        let url = format!("{}/spreadsheets", self.sheets_url);
        let body = self
            .send(
                "sheets",
                Method::POST,
                &url,
                Some(json!({ "properties": { "title": name } })),
                None,
            )
            .await?;

        let document_id = body["spreadsheetId"]
            .as_str()
            .ok_or_else(|| BackendError::Unavailable("create returned no spreadsheet id".to_string()))?
            .to_string();
        let doc_url = body["spreadsheetUrl"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("https://docs.google.com/spreadsheets/d/{document_id}")
            });

        Ok(DocumentHandle {
            document_id,
            url: doc_url,
        })
    }

    #[instrument(skip(self, batch))]
    async fn apply_batch(
        &self,
        document: &DocumentHandle,
        batch: &WriteBatch,
    ) -> Result<(), BackendError> {
        let requests = batch_requests(batch);
        if requests.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/spreadsheets/{}:batchUpdate",
            self.sheets_url, document.document_id
        );
        self.send(
            "sheets",
            Method::POST,
            &url,
            Some(json!({ "requests": requests })),
            None,
        )
        .await?;

        debug!(
            document = %document.document_id,
            requests = requests_len(batch),
            "directive batch applied"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let url = format!("{}/files/{}?fields=id", self.drive_url, self.root_folder_id);
        self.send("drive", Method::GET, &url, None, None).await?;
        Ok(())
    }
}

/// Translate a directive batch into ordered `batchUpdate` requests:
/// dimensions and merges first, then values, then formats. One API call
/// carries the whole batch.
fn batch_requests(batch: &WriteBatch) -> Vec<Value> {
    let mut requests = Vec::new();

    for update in &batch.column_widths {
        requests.push(json!({
            "updateDimensionProperties": {
                "range": { "sheetId": 0, "dimension": "COLUMNS",
                           "startIndex": update.col, "endIndex": update.col + 1 },
                "properties": { "pixelSize": update.width_px },
                "fields": "pixelSize",
            }
        }));
    }

    for spec in &batch.row_heights {
        let request = match spec.height {
            RowHeight::Fixed(px) => json!({
                "updateDimensionProperties": {
                    "range": { "sheetId": 0, "dimension": "ROWS",
                               "startIndex": spec.row, "endIndex": spec.row + 1 },
                    "properties": { "pixelSize": px },
                    "fields": "pixelSize",
                }
            }),
            RowHeight::AutoFit => json!({
                "autoResizeDimensions": {
                    "dimensions": { "sheetId": 0, "dimension": "ROWS",
                                    "startIndex": spec.row, "endIndex": spec.row + 1 },
                }
            }),
        };
        requests.push(request);
    }

    for merge in &batch.merges {
        requests.push(json!({
            "mergeCells": { "range": grid_range_json(merge), "mergeType": "MERGE_ALL" }
        }));
    }

    for write in &batch.values {
        requests.push(json!({
            "updateCells": {
                "start": { "sheetId": 0, "rowIndex": write.row, "columnIndex": write.col },
                "rows": [ { "values": [ { "userEnteredValue": payload_json(&write.payload) } ] } ],
                "fields": "userEnteredValue",
            }
        }));
    }

    for write in &batch.formats {
        let (format, fields) = format_json(&write.format);
        // Border-only formats have nothing for repeatCell to carry.
        if !format.as_object().map(|o| o.is_empty()).unwrap_or(true) {
            requests.push(json!({
                "repeatCell": {
                    "range": grid_range_json(&write.range),
                    "cell": { "userEnteredFormat": format },
                    "fields": fields,
                }
            }));
        }
        if write.format.bordered {
            let border = json!({ "style": "SOLID" });
            requests.push(json!({
                "updateBorders": {
                    "range": grid_range_json(&write.range),
                    "top": border, "bottom": border, "left": border, "right": border,
                    "innerHorizontal": border, "innerVertical": border,
                }
            }));
        }
    }

    requests
}

fn requests_len(batch: &WriteBatch) -> usize {
    batch.column_widths.len()
        + batch.row_heights.len()
        + batch.merges.len()
        + batch.values.len()
        + batch.formats.len()
}

fn grid_range_json(range: &GridRange) -> Value {
    json!({
        "sheetId": 0,
        "startRowIndex": range.start_row,
        "endRowIndex": range.end_row,
        "startColumnIndex": range.start_col,
        "endColumnIndex": range.end_col,
    })
}

fn payload_json(payload: &Payload) -> Value {
    match payload {
        Payload::Text(s) => json!({ "stringValue": s }),
        Payload::Number(n) => json!({ "numberValue": n }),
        Payload::Image(url) => json!({ "formulaValue": format!("=IMAGE(\"{url}\")") }),
        Payload::Blank => json!({ "stringValue": "" }),
    }
}

fn format_json(format: &CellFormat) -> (Value, String) {
    let mut fields = Vec::new();
    let mut out = serde_json::Map::new();

    if format.bold {
        out.insert("textFormat".to_string(), json!({ "bold": true }));
        fields.push("textFormat.bold");
    }
    if let Some(hex) = format.fill {
        out.insert("backgroundColor".to_string(), hex_color_json(hex));
        fields.push("backgroundColor");
    }
    if format.wrap {
        out.insert("wrapStrategy".to_string(), json!("WRAP"));
        fields.push("wrapStrategy");
    }
    if let Some(number_format) = format.number_format {
        let pattern = match number_format {
            NumberFormat::Currency => "$#,##0.00",
        };
        out.insert(
            "numberFormat".to_string(),
            json!({ "type": "CURRENCY", "pattern": pattern }),
        );
        fields.push("numberFormat");
    }
    if let Some(align) = format.align {
        let value = match align {
            HorizontalAlign::Center => "CENTER",
            HorizontalAlign::Right => "RIGHT",
        };
        out.insert("horizontalAlignment".to_string(), json!(value));
        fields.push("horizontalAlignment");
    }

    let fields = if fields.is_empty() {
        "userEnteredFormat".to_string()
    } else {
        fields
            .iter()
            .map(|f| format!("userEnteredFormat.{f}"))
            .collect::<Vec<_>>()
            .join(",")
    };

    (Value::Object(out), fields)
}

fn hex_color_json(hex: &str) -> Value {
    let hex = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(hex.get(range).unwrap_or("00"), 16).unwrap_or(0) as f64 / 255.0
    };
    json!({ "red": channel(0..2), "green": channel(2..4), "blue": channel(4..6) })
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
