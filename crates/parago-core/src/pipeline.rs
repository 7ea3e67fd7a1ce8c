//! End-to-end scan orchestration.
//!
//! A batch walks each uploaded file through validation, analysis, field
//! extraction, duplicate detection, and commit. Files are independent: one
//! failure never aborts the rest of the batch. Failed files leave their
//! placeholder receipt pending so the sweeper can reclaim it later.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dedup::DuplicateDetector;
use crate::enrich::{EnrichmentHandle, EnrichmentJob};
use crate::error::{ErrorKind, ScanError};
use crate::extract::ReceiptExtractor;
use crate::llm::TextGenerator;
use crate::models::{
    Category, NewTransaction, ReceiptCommit, ReceiptNotes, ScanConfig, TransactionSource,
};
use crate::ocr::{MediaType, OcrClient};
use crate::store::RecordStore;

/// One uploaded document, as received from the transport layer.
#[derive(Debug, Clone)]
pub struct ScanFile {
    /// Original file name, used for extension fallback and reporting.
    pub name: String,
    /// Declared MIME type, if the client sent one.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A scan batch for a single owner.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Placeholder receipt created before upload; the first file commits
    /// into it, later files get fresh placeholders.
    pub receipt_id: String,
    pub owner_id: String,
    pub files: Vec<ScanFile>,
}

/// Committed receipt fields echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSummary {
    pub vendor: String,
    pub total: Decimal,
    pub date: NaiveDate,
    pub currency: String,
    /// Number of line items recognized on the receipt.
    pub items: usize,
}

/// Terminal state of one file in a batch.
#[derive(Debug)]
pub enum FileOutcome {
    /// The file committed into this receipt.
    Success {
        receipt_id: String,
        summary: ScanSummary,
    },
    /// The owner already has this receipt; the new placeholder was discarded.
    Duplicate { existing_receipt_id: String },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

/// Outcome of one file, tagged with its name for reporting.
#[derive(Debug)]
pub struct FileResult {
    pub file: String,
    pub outcome: FileOutcome,
}

/// Everything the transport layer needs to build a response.
#[derive(Debug)]
pub struct ScanReport {
    /// The placeholder id the batch was submitted under.
    pub receipt_id: String,
    pub results: Vec<FileResult>,
}

impl ScanReport {
    pub fn files_processed(&self) -> usize {
        self.results.len()
    }

    pub fn files_succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, FileOutcome::Success { .. }))
            .count()
    }

    /// Duplicates count as failures here; the caller reports them that way.
    pub fn files_failed(&self) -> usize {
        self.files_processed() - self.files_succeeded()
    }

    /// A batch is the caller's fault only when nothing succeeded and at
    /// least one file was rejected for a critical reason (empty, oversized,
    /// unsupported type, unreadable document). Transient failures and
    /// duplicates never turn the whole batch into a client error.
    pub fn is_client_error(&self) -> bool {
        let any_success = self
            .results
            .iter()
            .any(|r| matches!(r.outcome, FileOutcome::Success { .. }));
        let any_critical = self.results.iter().any(|r| {
            matches!(&r.outcome, FileOutcome::Failed { kind, .. } if kind.is_critical())
        });
        !any_success && any_critical
    }
}

/// Drives scan batches from upload to committed receipt.
pub struct ScanPipeline {
    store: Arc<dyn RecordStore>,
    ocr: OcrClient,
    extractor: ReceiptExtractor,
    dedup: DuplicateDetector,
    llm: Option<Arc<dyn TextGenerator>>,
    enrichment: Option<EnrichmentHandle>,
    config: ScanConfig,
}

impl ScanPipeline {
    pub fn new(store: Arc<dyn RecordStore>, ocr: OcrClient, config: ScanConfig) -> Self {
        Self {
            extractor: ReceiptExtractor::new(config.extraction.clone()),
            dedup: DuplicateDetector::new(store.clone()),
            store,
            ocr,
            llm: None,
            enrichment: None,
            config,
        }
    }

    /// Attach a text-generation client for vendor verification.
    pub fn with_text_generator(mut self, llm: Arc<dyn TextGenerator>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Attach the background categorization worker.
    pub fn with_enrichment(mut self, handle: EnrichmentHandle) -> Self {
        self.enrichment = Some(handle);
        self
    }

    /// Process every file in the batch sequentially and report per-file
    /// outcomes. Never fails as a whole: errors are folded into the report.
    pub async fn process_batch(&self, request: ScanRequest) -> ScanReport {
        info!(
            owner = %request.owner_id,
            files = request.files.len(),
            "scan batch received"
        );

        // Snapshot the owner's categories once per batch. Losing them only
        // disables enrichment, never the scan itself.
        let taxonomy = match self.store.categories(&request.owner_id).await {
            Ok(categories) => categories,
            Err(err) => {
                warn!(error = %err, "category lookup failed, skipping enrichment for batch");
                Vec::new()
            }
        };

        let mut results = Vec::with_capacity(request.files.len());
        for (index, file) in request.files.iter().enumerate() {
            let outcome = self.process_file(&request, index, file, &taxonomy).await;
            results.push(FileResult {
                file: file.name.clone(),
                outcome,
            });
        }

        let report = ScanReport {
            receipt_id: request.receipt_id,
            results,
        };
        info!(
            processed = report.files_processed(),
            succeeded = report.files_succeeded(),
            failed = report.files_failed(),
            "scan batch finished"
        );
        report
    }

    async fn process_file(
        &self,
        request: &ScanRequest,
        index: usize,
        file: &ScanFile,
        taxonomy: &[Category],
    ) -> FileOutcome {
        let receipt_id = if index == 0 {
            request.receipt_id.clone()
        } else {
            match self.store.create_receipt(&request.owner_id).await {
                Ok(receipt) => receipt.id,
                Err(err) => {
                    warn!(file = %file.name, error = %err, "placeholder creation failed");
                    return FileOutcome::Failed {
                        kind: ErrorKind::Unknown,
                        message: err.to_string(),
                    };
                }
            }
        };

        match self.ingest(request, &receipt_id, file, taxonomy).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // The placeholder stays pending; the sweeper reclaims it.
                warn!(
                    file = %file.name,
                    receipt = %receipt_id,
                    error = %err,
                    "file scan failed"
                );
                FileOutcome::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        }
    }

    /// The per-file state machine: validate, analyze, extract, dedup, commit.
    async fn ingest(
        &self,
        request: &ScanRequest,
        receipt_id: &str,
        file: &ScanFile,
        taxonomy: &[Category],
    ) -> Result<FileOutcome, ScanError> {
        if file.bytes.is_empty() {
            return Err(ScanError::EmptyFile);
        }
        let limit = self.config.upload.max_file_bytes;
        if file.bytes.len() > limit {
            return Err(ScanError::FileTooLarge {
                size: file.bytes.len(),
                limit,
            });
        }
        let media_type = resolve_media_type(file)?;
        debug!(file = %file.name, media = media_type.as_mime(), "file accepted for analysis");

        let analysis = self.ocr.analyze(&file.bytes, media_type).await?;
        let parsed = self.extractor.extract(&analysis, self.llm.as_deref()).await;

        // Absent fields commit as placeholders rather than failing the scan.
        let vendor = parsed
            .vendor
            .clone()
            .unwrap_or_else(|| "Unknown Store".to_string());
        let total = parsed.total.unwrap_or(Decimal::ZERO);
        let date = parsed.date.unwrap_or_else(|| Utc::now().date_naive());

        // Duplicate detection runs on the same values a commit would write,
        // so a resubmitted file always collides with its first commit. A
        // match on the current receipt id is not a duplicate but a retried
        // extraction of this placeholder: fall through to commit, which
        // replaces the stale transaction in place.
        if let Some(existing) = self
            .dedup
            .find_duplicate(&request.owner_id, &vendor, total, date)
            .await?
        {
            if existing != receipt_id {
                if let Err(err) = self.store.delete_receipt(receipt_id).await {
                    warn!(receipt = %receipt_id, error = %err, "placeholder cleanup failed");
                }
                info!(existing = %existing, "duplicate receipt, scan discarded");
                return Ok(FileOutcome::Duplicate {
                    existing_receipt_id: existing,
                });
            }
        }

        self.store
            .commit_receipt(
                receipt_id,
                &ReceiptCommit {
                    vendor: vendor.clone(),
                    date,
                    total,
                    currency: parsed.currency.clone(),
                    notes: ReceiptNotes {
                        items: parsed.items.clone(),
                        message: None,
                    },
                },
            )
            .await?;

        // Rescanning an existing receipt replaces its transaction.
        self.store
            .delete_transactions_for_receipt(&request.owner_id, receipt_id)
            .await?;
        self.store
            .insert_transaction(NewTransaction {
                owner_id: request.owner_id.clone(),
                receipt_id: receipt_id.to_string(),
                title: format!("{vendor} - purchase"),
                amount: total,
                date,
                vendor: vendor.clone(),
                category_id: None,
                source: TransactionSource::Ocr,
            })
            .await?;
        info!(receipt = %receipt_id, vendor = %vendor, total = %total, "receipt committed");

        if !parsed.items.is_empty() {
            if let Some(handle) = &self.enrichment {
                handle.dispatch(EnrichmentJob {
                    receipt_id: receipt_id.to_string(),
                    owner_id: request.owner_id.clone(),
                    items: parsed.items.clone(),
                    taxonomy: taxonomy.to_vec(),
                });
            }
        }

        Ok(FileOutcome::Success {
            receipt_id: receipt_id.to_string(),
            summary: ScanSummary {
                vendor,
                total,
                date,
                currency: parsed.currency,
                items: parsed.items.len(),
            },
        })
    }
}

/// Pick the media type from the declared MIME when it is specific; fall back
/// to the file extension when the declaration is missing or generic.
fn resolve_media_type(file: &ScanFile) -> Result<MediaType, ScanError> {
    let declared = file
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && !ct.eq_ignore_ascii_case("application/octet-stream"));

    match declared {
        Some(mime) => {
            MediaType::from_mime(mime).ok_or_else(|| ScanError::InvalidType(mime.to_string()))
        }
        None => MediaType::from_filename(&file.name).ok_or_else(|| {
            ScanError::InvalidType(format!("unrecognized file type for {}", file.name))
        }),
    }
}
