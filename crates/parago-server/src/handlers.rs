//! Request handlers and the response envelope.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, warn};

use parago_core::{ErrorKind, FileOutcome, ScanFile, ScanReport, ScanRequest, ScanSummary};

use crate::AppState;

/// Per-file entry in the response envelope.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ScanSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response envelope for the scan endpoint. `success` reflects whether any
/// file in the batch committed; per-file outcomes are reported independently.
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    pub files_processed: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub results: Vec<FileReport>,
    /// The placeholder id supplied in the request, echoed back.
    pub receipt_id: String,
}

impl From<ScanReport> for ScanResponse {
    fn from(report: ScanReport) -> Self {
        let files_processed = report.files_processed();
        let files_succeeded = report.files_succeeded();
        let files_failed = report.files_failed();

        let results = report
            .results
            .into_iter()
            .map(|result| match result.outcome {
                FileOutcome::Success {
                    receipt_id,
                    summary,
                } => FileReport {
                    file: result.file,
                    success: true,
                    receipt_id: Some(receipt_id),
                    data: Some(summary),
                    error: None,
                    message: None,
                },
                FileOutcome::Duplicate {
                    existing_receipt_id,
                } => FileReport {
                    file: result.file,
                    success: false,
                    receipt_id: Some(existing_receipt_id),
                    data: None,
                    error: Some(ErrorKind::Duplicate.as_str()),
                    message: Some("receipt already scanned".to_string()),
                },
                FileOutcome::Failed { kind, message } => FileReport {
                    file: result.file,
                    success: false,
                    receipt_id: None,
                    data: None,
                    error: Some(kind.as_str()),
                    message: Some(message),
                },
            })
            .collect();

        Self {
            success: files_succeeded > 0,
            files_processed,
            files_succeeded,
            files_failed,
            results,
            receipt_id: report.receipt_id,
        }
    }
}

pub async fn health() -> &'static str {
    "OK"
}

/// Batch scan endpoint. Walks the multipart form, hands the files to the
/// pipeline, and reports every file independently.
pub async fn scan_receipts(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut receipt_id: Option<String> = None;
    let mut owner_id: Option<String> = None;
    let mut files: Vec<ScanFile> = Vec::new();
    let mut read_error: Option<String> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or("").to_string();
                match name.as_str() {
                    "receiptId" => match field.text().await {
                        Ok(value) => receipt_id = Some(value),
                        Err(err) => {
                            read_error = Some(err.to_string());
                            break;
                        }
                    },
                    "userId" => match field.text().await {
                        Ok(value) => owner_id = Some(value),
                        Err(err) => {
                            read_error = Some(err.to_string());
                            break;
                        }
                    },
                    "files" => {
                        let file_name = field.file_name().unwrap_or("upload").to_string();
                        let content_type = field.content_type().map(str::to_string);
                        match field.bytes().await {
                            Ok(bytes) => files.push(ScanFile {
                                name: file_name,
                                content_type,
                                bytes: bytes.to_vec(),
                            }),
                            Err(err) => {
                                read_error = Some(err.to_string());
                                break;
                            }
                        }
                    }
                    other => {
                        debug!(field = other, "ignoring unknown form field");
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                read_error = Some(err.to_string());
                break;
            }
        }
    }

    let Some(owner_id) = owner_id.filter(|v| !v.trim().is_empty()) else {
        return error_response(StatusCode::UNAUTHORIZED, "userId is required");
    };

    // A body that dies mid-upload is an infrastructure failure, not a bad
    // request. Fail the placeholder when we already know which one it is.
    if let Some(message) = read_error {
        if let Some(id) = &receipt_id {
            let note = format!("receipt scan failed: {message}");
            if let Err(err) = state.store.mark_receipt_failed(id, &note).await {
                warn!(receipt = %id, error = %err, "could not mark placeholder failed");
            }
        }
        warn!(error = %message, "scan request body could not be read");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &message);
    }

    let Some(receipt_id) = receipt_id.filter(|v| !v.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "receiptId is required");
    };
    if files.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no files uploaded");
    }

    let report = state
        .pipeline
        .process_batch(ScanRequest {
            receipt_id,
            owner_id,
            files,
        })
        .await;

    let status = if report.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (status, Json(ScanResponse::from(report))).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({ "success": false, "message": message });
    (status, Json(body)).into_response()
}
