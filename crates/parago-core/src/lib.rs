//! Core library for receipt scanning and ingestion.
//!
//! This crate provides:
//! - Upload validation and the per-file scan pipeline
//! - OCR submission and polling against a document-analysis service
//! - Receipt field extraction (vendor, totals, dates, line items)
//! - Duplicate detection and background item categorization
//! - A persistence seam with an in-memory reference store

pub mod dedup;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod store;
pub mod sweep;

pub use dedup::DuplicateDetector;
pub use enrich::{spawn_enrichment_worker, Categorizer, EnrichmentHandle, EnrichmentJob};
pub use error::{ErrorKind, LlmError, OcrError, Result, ScanError, StoreError};
pub use extract::ReceiptExtractor;
pub use llm::{ChatCompletionsClient, TextGenerator};
pub use models::{
    Category, LineItem, ParsedReceipt, ReceiptCommit, ReceiptNotes, ReceiptRecord, ReceiptStatus,
    ScanConfig, TransactionRecord, TransactionSource,
};
pub use ocr::{AnalyzeBackend, HttpAnalyzeBackend, MediaType, OcrClient};
pub use pipeline::{
    FileOutcome, FileResult, ScanFile, ScanPipeline, ScanReport, ScanRequest, ScanSummary,
};
pub use store::{MemoryStore, RecordStore};
pub use sweep::spawn_sweeper;
