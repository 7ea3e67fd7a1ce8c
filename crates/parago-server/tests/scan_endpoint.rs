//! Endpoint tests speaking raw multipart/HTTP against an ephemeral listener.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use parago_core::error::OcrError;
use parago_core::models::OcrConfig;
use parago_core::ocr::protocol::{
    AnalyzeOperation, AnalyzeResult, AnalyzedDocument, FieldValue, ItemEntry, ItemFields,
    ItemsField, OperationStatus, ReceiptFields,
};
use parago_core::ocr::JobRef;
use parago_core::{
    AnalyzeBackend, MediaType, MemoryStore, OcrClient, RecordStore, ScanConfig, ScanPipeline,
};
use parago_server::{build_router, AppState};

const BOUNDARY: &str = "paragoboundary42";

/// Replays a scripted list of poll responses, one per submitted file.
struct ScriptedAnalyze {
    polls: Mutex<VecDeque<AnalyzeOperation>>,
}

#[async_trait]
impl AnalyzeBackend for ScriptedAnalyze {
    async fn submit(&self, _bytes: &[u8], _media: MediaType) -> Result<JobRef, OcrError> {
        Ok(JobRef {
            url: "https://vendor.invalid/jobs/1".to_string(),
        })
    }

    async fn poll(&self, _job: &JobRef) -> Result<AnalyzeOperation, OcrError> {
        self.polls.lock().pop_front().ok_or(OcrError::Analysis {
            code: "ScriptExhausted".to_string(),
            message: "poll called more times than scripted".to_string(),
        })
    }
}

fn fv_string(s: &str) -> FieldValue {
    FieldValue {
        value_string: Some(s.to_string()),
        ..FieldValue::default()
    }
}

fn fv_number(n: f64) -> FieldValue {
    FieldValue {
        value_number: Some(n),
        ..FieldValue::default()
    }
}

fn lidl_receipt() -> AnalyzeOperation {
    let fields = ReceiptFields {
        merchant_name: Some(fv_string("STOWT LIDL SP. Z O.O.")),
        total: Some(fv_number(23.45)),
        transaction_date: Some(FieldValue {
            value_date: NaiveDate::from_ymd_opt(2024, 3, 15),
            ..FieldValue::default()
        }),
        items: Some(ItemsField {
            value_array: vec![
                ItemEntry {
                    value_object: ItemFields {
                        description: Some(fv_string("Mleko UHT 3.2%")),
                        total_price: Some(fv_number(7.50)),
                        ..ItemFields::default()
                    },
                },
                ItemEntry {
                    value_object: ItemFields {
                        description: Some(fv_string("Chleb żytni")),
                        total_price: Some(fv_number(15.95)),
                        ..ItemFields::default()
                    },
                },
            ],
        }),
        ..ReceiptFields::default()
    };
    AnalyzeOperation {
        status: OperationStatus::Succeeded,
        analyze_result: Some(AnalyzeResult {
            content: String::new(),
            documents: vec![AnalyzedDocument {
                doc_type: "receipt.retailMeal".to_string(),
                fields,
            }],
        }),
        error: None,
    }
}

async fn start_server(polls: Vec<AnalyzeOperation>) -> (SocketAddr, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = ScanConfig {
        ocr: OcrConfig {
            poll_interval_ms: 0,
            max_polls: 2,
            ..OcrConfig::default()
        },
        ..ScanConfig::default()
    };
    let backend = ScriptedAnalyze {
        polls: Mutex::new(polls.into()),
    };
    let ocr = OcrClient::new(Arc::new(backend), &config.ocr);
    let max_file_bytes = config.upload.max_file_bytes;
    let pipeline = ScanPipeline::new(store.clone(), ocr, config);
    let state = AppState::new(pipeline, store.clone(), max_file_bytes);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    (addr, store)
}

struct Part<'a> {
    name: &'a str,
    file_name: Option<&'a str>,
    content_type: Option<&'a str>,
    body: &'a [u8],
}

fn text_part<'a>(name: &'a str, value: &'a str) -> Part<'a> {
    Part {
        name,
        file_name: None,
        content_type: None,
        body: value.as_bytes(),
    }
}

fn file_part<'a>(file_name: &'a str, content_type: &'a str, body: &'a [u8]) -> Part<'a> {
    Part {
        name: "files",
        file_name: Some(file_name),
        content_type: Some(content_type),
        body,
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{file_name}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.body);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_scan(addr: SocketAddr, body: &[u8]) -> (u16, serde_json::Value) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let head = format!(
        "POST /api/receipts/scan HTTP/1.1\r\nHost: {addr}\r\nContent-Type: multipart/form-data; boundary={BOUNDARY}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await.expect("write head");
    stream.write_all(body).await.expect("write body");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status");
    let value = serde_json::from_str(body).expect("json body");
    (status, value)
}

#[tokio::test]
async fn test_scan_commits_then_detects_duplicate() {
    let (addr, store) = start_server(vec![lidl_receipt(), lidl_receipt()]).await;
    let first_id = store.create_receipt("owner-7").await.expect("create").id;

    let body = multipart_body(&[
        text_part("receiptId", &first_id),
        text_part("userId", "owner-7"),
        file_part("paragon.jpg", "image/jpeg", b"scan bytes"),
    ]);
    let (status, value) = post_scan(addr, &body).await;

    assert_eq!(status, 200);
    assert_eq!(value["success"], true);
    assert_eq!(value["files_processed"], 1);
    assert_eq!(value["files_succeeded"], 1);
    assert_eq!(value["files_failed"], 0);
    assert_eq!(value["receipt_id"], first_id.as_str());
    let row = &value["results"][0];
    assert_eq!(row["file"], "paragon.jpg");
    assert_eq!(row["success"], true);
    assert_eq!(row["receipt_id"], first_id.as_str());
    assert_eq!(row["data"]["vendor"], "Lidl");
    assert_eq!(row["data"]["total"], "23.45");
    assert_eq!(row["data"]["date"], "2024-03-15");
    assert_eq!(row["data"]["currency"], "PLN");
    assert_eq!(row["data"]["items"], 2);

    let transactions = store
        .transactions_for_receipt("owner-7", &first_id)
        .await
        .expect("transactions");
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].title, "Lidl - purchase");

    // The same receipt scanned again: reported as duplicate, placeholder gone.
    let second_id = store.create_receipt("owner-7").await.expect("create").id;
    let body = multipart_body(&[
        text_part("receiptId", &second_id),
        text_part("userId", "owner-7"),
        file_part("paragon.jpg", "image/jpeg", b"scan bytes"),
    ]);
    let (status, value) = post_scan(addr, &body).await;

    assert_eq!(status, 200);
    assert_eq!(value["success"], false);
    assert_eq!(value["files_failed"], 1);
    let row = &value["results"][0];
    assert_eq!(row["error"], "duplicate");
    assert_eq!(row["receipt_id"], first_id.as_str());
    assert!(store.receipt(&second_id).await.expect("lookup").is_none());
}

#[tokio::test]
async fn test_missing_user_is_unauthorized() {
    let (addr, store) = start_server(vec![]).await;
    let id = store.create_receipt("owner-7").await.expect("create").id;

    let body = multipart_body(&[
        text_part("receiptId", &id),
        file_part("paragon.jpg", "image/jpeg", b"scan bytes"),
    ]);
    let (status, value) = post_scan(addr, &body).await;

    assert_eq!(status, 401);
    assert_eq!(value["success"], false);
}

#[tokio::test]
async fn test_request_without_files_is_rejected() {
    let (addr, store) = start_server(vec![]).await;
    let id = store.create_receipt("owner-7").await.expect("create").id;

    let body = multipart_body(&[text_part("receiptId", &id), text_part("userId", "owner-7")]);
    let (status, value) = post_scan(addr, &body).await;

    assert_eq!(status, 400);
    assert_eq!(value["success"], false);
}

#[tokio::test]
async fn test_all_critical_failures_return_bad_request() {
    let (addr, store) = start_server(vec![]).await;
    let id = store.create_receipt("owner-7").await.expect("create").id;

    let body = multipart_body(&[
        text_part("receiptId", &id),
        text_part("userId", "owner-7"),
        file_part("empty.jpg", "image/jpeg", b""),
    ]);
    let (status, value) = post_scan(addr, &body).await;

    assert_eq!(status, 400);
    assert_eq!(value["success"], false);
    assert_eq!(value["results"][0]["error"], "empty_file");
    // The placeholder survives for the reconciliation sweep.
    assert!(store.receipt(&id).await.expect("lookup").is_some());
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, _store) = start_server(vec![]).await;
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let req = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    assert!(head.starts_with("HTTP/1.1 200"));
    assert_eq!(body, "OK");
}
