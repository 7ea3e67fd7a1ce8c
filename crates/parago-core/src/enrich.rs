//! Background item categorization.
//!
//! After a receipt commits, its line items are handed to a detached worker
//! that asks the language model for category assignments in a single batched
//! call and writes them back under a revision guard. Nothing in here can
//! fail a scan: every error is logged and dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::TextGenerator;
use crate::models::{Category, CategorizeConfig, LineItem, ReceiptStatus};
use crate::store::RecordStore;

const CATEGORIZE_SYSTEM: &str = "You assign expense categories to retail receipt line \
items. Reply with a JSON array holding exactly one element per item, in item order: the \
id of the best-fitting category, or null when none fits. Reply with the array only, no \
explanations.";

/// Number of fresh reads attempted when the revision guard loses a race.
const WRITE_BACK_ATTEMPTS: u32 = 3;

/// Asks the language model to categorize line items against a taxonomy.
pub struct Categorizer {
    llm: Arc<dyn TextGenerator>,
}

impl Categorizer {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// Assign a category id to each item in one batched call. The reply is
    /// parsed defensively: an unparseable reply yields all-None rather than
    /// an error, while transport and API failures surface as `Err` so the
    /// caller can retry.
    pub async fn assign_categories(
        &self,
        items: &[LineItem],
        taxonomy: &[Category],
    ) -> Result<Vec<Option<String>>, LlmError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        // Nothing to assign against; skip the call entirely.
        if taxonomy.is_empty() {
            return Ok(vec![None; items.len()]);
        }

        let prompt = build_prompt(items, taxonomy);
        let reply = self.llm.complete(CATEGORIZE_SYSTEM, &prompt).await?;

        let valid: HashSet<&str> = taxonomy.iter().map(|c| c.id.as_str()).collect();
        let mut assignments = parse_assignments(&reply, items.len());
        for slot in &mut assignments {
            if slot.as_deref().is_some_and(|id| !valid.contains(id)) {
                *slot = None;
            }
        }
        Ok(assignments)
    }
}

fn build_prompt(items: &[LineItem], taxonomy: &[Category]) -> String {
    let mut prompt = String::from("Categories:\n");
    for category in taxonomy {
        prompt.push_str(&format!("- {}: {}\n", category.id, category.name));
    }
    prompt.push_str("\nItems:\n");
    for (idx, item) in items.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", idx + 1, item.name));
    }
    prompt
}

/// Parse the model reply into one assignment per item. Code fences are
/// stripped, and when the reply wraps the array in prose the bracketed part
/// is tried on its own. The result is padded or truncated to `item_count`.
fn parse_assignments(reply: &str, item_count: usize) -> Vec<Option<String>> {
    let cleaned = strip_code_fences(reply);
    let parsed: Option<Vec<Option<String>>> = serde_json::from_str(cleaned)
        .ok()
        .or_else(|| extract_bracketed(cleaned).and_then(|s| serde_json::from_str(s).ok()));

    let mut assignments = match parsed {
        Some(assignments) => assignments,
        None => {
            warn!("categorization reply was not a JSON array, treating as no assignments");
            vec![None; item_count]
        }
    };
    assignments.resize(item_count, None);
    assignments
}

fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.trim_end().trim_end_matches("```").trim()
}

fn extract_bracketed(s: &str) -> Option<&str> {
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    (end > start).then(|| &s[start..=end])
}

/// A committed receipt waiting for category assignments.
pub struct EnrichmentJob {
    pub receipt_id: String,
    pub owner_id: String,
    pub items: Vec<LineItem>,
    pub taxonomy: Vec<Category>,
}

/// Cheap handle for dispatching jobs to the enrichment worker.
#[derive(Clone)]
pub struct EnrichmentHandle {
    sender: mpsc::UnboundedSender<EnrichmentJob>,
}

impl EnrichmentHandle {
    /// Queue a job. Fire-and-forget: a dead worker only produces a log line.
    pub fn dispatch(&self, job: EnrichmentJob) {
        if self.sender.send(job).is_err() {
            warn!("enrichment worker is gone, job dropped");
        }
    }
}

/// Spawn the detached enrichment worker and return its dispatch handle.
pub fn spawn_enrichment_worker(
    store: Arc<dyn RecordStore>,
    categorizer: Categorizer,
    config: CategorizeConfig,
) -> EnrichmentHandle {
    let (sender, mut receiver) = mpsc::unbounded_channel::<EnrichmentJob>();
    tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            process_job(store.as_ref(), &categorizer, &config, job).await;
        }
        debug!("enrichment worker shutting down");
    });
    EnrichmentHandle { sender }
}

async fn process_job(
    store: &dyn RecordStore,
    categorizer: &Categorizer,
    config: &CategorizeConfig,
    job: EnrichmentJob,
) {
    if job.items.is_empty() {
        return;
    }
    if job.taxonomy.is_empty() {
        debug!(receipt = %job.receipt_id, "owner has no categories, skipping enrichment");
        return;
    }

    let mut assignments = None;
    for attempt in 1..=config.max_attempts {
        match categorizer.assign_categories(&job.items, &job.taxonomy).await {
            Ok(result) => {
                assignments = Some(result);
                break;
            }
            Err(err) => {
                warn!(attempt, error = %err, receipt = %job.receipt_id, "categorization attempt failed");
                if attempt < config.max_attempts {
                    let delay = config.backoff_ms * 2u64.pow(attempt - 1);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
    let Some(assignments) = assignments else {
        warn!(receipt = %job.receipt_id, "categorization gave up after retries");
        return;
    };

    if assignments.iter().all(Option::is_none) {
        debug!(receipt = %job.receipt_id, "no assignments produced, nothing to write");
        return;
    }

    write_back(store, &job, &assignments).await;
}

/// Apply assignments to the receipt's current notes under a revision guard.
/// The receipt may have been edited or re-scanned since the job was queued;
/// in that case the assignments no longer line up and the job is dropped.
async fn write_back(store: &dyn RecordStore, job: &EnrichmentJob, assignments: &[Option<String>]) {
    for _ in 0..WRITE_BACK_ATTEMPTS {
        let record = match store.receipt(&job.receipt_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(receipt = %job.receipt_id, "receipt vanished before category write-back");
                return;
            }
            Err(err) => {
                warn!(error = %err, receipt = %job.receipt_id, "category write-back read failed");
                return;
            }
        };
        if record.status != ReceiptStatus::Processed
            || record.notes.items.len() != assignments.len()
        {
            warn!(receipt = %job.receipt_id, "receipt changed shape, dropping category assignments");
            return;
        }

        let mut notes = record.notes.clone();
        for (item, category) in notes.items.iter_mut().zip(assignments) {
            item.category_id = category.clone();
        }

        match store
            .update_notes_if_revision(&job.receipt_id, record.revision, &notes)
            .await
        {
            Ok(true) => {
                debug!(receipt = %job.receipt_id, "categories written");
                return;
            }
            Ok(false) => continue,
            Err(err) => {
                warn!(error = %err, receipt = %job.receipt_id, "category write-back failed");
                return;
            }
        }
    }
    warn!(receipt = %job.receipt_id, "category write-back kept losing the revision race, giving up");
}
